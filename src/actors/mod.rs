// Actor模块 - 使用Actor模式管理并发状态
//
// LLM客户端由单独的任务持有，其余组件通过可克隆的 Handle 发送消息

pub mod llm_manager;

pub use llm_manager::{LLMCommand, LLMHandle, LLMManagerActor};
