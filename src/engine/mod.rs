pub mod geofence;
pub mod ingest;
pub mod lifecycle;
pub mod sweeper;
