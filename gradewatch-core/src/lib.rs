pub mod config;
pub mod diff;
pub mod fetch;
pub mod models;
pub mod notify;
pub mod semester;
pub mod store;

pub use config::{
    FetcherConfig, MonitorConfig, NotifyBackend, NotifyConfig, RecoveryAction, ServiceConfig,
    StorageConfig, TermConfig, WatchConfig,
};
pub use fetch::{Credentials, EamsClient, FetchError, GradeFetcher};
pub use models::{GradeRecord, Snapshot, UsualGradeRecord};
pub use notify::{LogNotifier, Notifier, NotifyError, NtfyNotifier};
pub use store::{SnapshotStore, StoreError};
