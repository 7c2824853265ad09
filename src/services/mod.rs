/// OpenAPI documentation generation.
pub mod documentation;
/// Health check service.
pub mod health_service;
/// Progress tracking, finish detection, and the race-scoped leaderboard.
pub mod progress_service;
/// Room event broadcasting onto the per-room SSE channels.
pub mod room_events;
/// Room directory: creation, join admission, polling reads, and race start.
pub mod room_service;
/// Server-Sent Events streaming per room.
pub mod sse_service;
/// Storage persistence supervisor with reconnect backoff.
pub mod storage_supervisor;
