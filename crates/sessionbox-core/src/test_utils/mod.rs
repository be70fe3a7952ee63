pub mod fake_sandbox;
pub mod mock_llm;
pub mod mock_openai_server;
pub mod mock_sessions_server;
