mod broker_session_tests;
mod concurrent_queue_tests;
