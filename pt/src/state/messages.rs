//! State manager messages
//!
//! Commands and responses for the actor pattern.

use thiserror::Error;
use tokio::sync::oneshot;

use crate::domain::{CustomToken, PetitionRecord, Profile, UserAccount};

/// Errors from state operations
#[derive(Debug, Error)]
pub enum StateError {
    #[error("Store error: {0}")]
    StoreError(String),

    #[error("Channel error")]
    ChannelError,
}

/// Response from state operations
pub type StateResponse<T> = Result<T, StateError>;

/// Commands sent to the StateManager actor
#[derive(Debug)]
pub enum StateCommand {
    // Petition operations
    CreatePetition {
        record: PetitionRecord,
        reply: oneshot::Sender<StateResponse<String>>,
    },
    GetPetition {
        id: String,
        reply: oneshot::Sender<StateResponse<Option<PetitionRecord>>>,
    },
    ListPetitions {
        app_id: String,
        owner_id: String,
        reply: oneshot::Sender<StateResponse<Vec<PetitionRecord>>>,
    },

    // Profile operations
    PutProfile {
        profile: Profile,
        reply: oneshot::Sender<StateResponse<()>>,
    },
    GetProfile {
        id: String,
        reply: oneshot::Sender<StateResponse<Option<Profile>>>,
    },

    // Local identity operations
    /// Insert unless the email is already registered; `None` when it is
    CreateAccountIfAbsent {
        account: UserAccount,
        reply: oneshot::Sender<StateResponse<Option<String>>>,
    },
    GetAccount {
        id: String,
        reply: oneshot::Sender<StateResponse<Option<UserAccount>>>,
    },
    FindAccountByEmail {
        email: String,
        reply: oneshot::Sender<StateResponse<Option<UserAccount>>>,
    },
    CreateCustomToken {
        token: CustomToken,
        reply: oneshot::Sender<StateResponse<String>>,
    },
    /// Fetch and delete in one step (tokens are single use)
    TakeCustomToken {
        token: String,
        reply: oneshot::Sender<StateResponse<Option<CustomToken>>>,
    },

    /// Store data version, bumped by commits from other connections
    DataVersion {
        reply: oneshot::Sender<StateResponse<i64>>,
    },

    // Shutdown
    Shutdown,
}
