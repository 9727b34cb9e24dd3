pub mod callback_server;
pub mod error;
pub mod flow;
pub mod token_manager;

pub use {
    callback_server::CallbackServer,
    error::{Error, Result},
    flow::{
        AuthEndpoints, AuthFlow, AuthorizationRequest, CALLBACK_PATH, DEFAULT_CALLBACK_PORT,
        TokenGrant, generate_state,
    },
    token_manager::TokenManager,
};
