pub mod chunk_commit;
pub mod event_publish;
pub mod frame_capture;
pub mod query_enumerate;
