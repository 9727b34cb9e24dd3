pub mod credentials;
pub mod error;
pub mod jobs;
pub mod paths;

pub use {
    credentials::{CredentialStore, CredentialsFile, serialize_option_secret, serialize_secret},
    error::{Error, Result},
    jobs::{JobKind, POST_CONFIG_KEY, PostJob, load_post_config, set_rotation_cursor},
    paths::{config_dir, discover_credentials_path},
};
