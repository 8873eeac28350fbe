pub mod timeline_sync;
