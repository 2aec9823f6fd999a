//! StateManager - actor that owns PetitionStore
//!
//! Processes commands via channels for thread-safe access to persistent state.

use std::path::Path;
use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{debug, info};

use crate::domain::{CustomToken, Filter, PetitionRecord, Profile, Store, UserAccount};

use super::messages::{StateCommand, StateError, StateResponse};

/// Event broadcast when state changes that live views should react to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StateEvent {
    /// A petition record was persisted
    PetitionCreated { app_id: String, owner_id: String, id: String },
    /// A profile was written
    ProfileWritten { uid: String },
}

/// Handle to send commands to the StateManager
#[derive(Clone)]
pub struct StateManager {
    tx: mpsc::Sender<StateCommand>,
    /// Broadcast sender for state change notifications
    event_tx: broadcast::Sender<StateEvent>,
}

impl StateManager {
    /// Spawn a new StateManager actor over the store in `store_path`
    pub fn spawn(store_path: impl AsRef<Path>) -> eyre::Result<Self> {
        debug!(store_path = %store_path.as_ref().display(), "spawn: called");
        let mut store = Store::open(store_path.as_ref())?;

        let petition_count = store.rebuild_indexes::<PetitionRecord>()?;
        let account_count = store.rebuild_indexes::<UserAccount>()?;
        let token_count = store.rebuild_indexes::<CustomToken>()?;
        let profile_count = store.rebuild_indexes::<Profile>()?;
        info!(
            petition_count,
            account_count, token_count, profile_count, "Rebuilt indexes for all record types"
        );

        Ok(Self::spawn_with_store(store))
    }

    /// Spawn over an in-memory store (tests, dry runs)
    pub fn spawn_in_memory() -> eyre::Result<Self> {
        debug!("spawn_in_memory: called");
        Ok(Self::spawn_with_store(Store::open_in_memory()?))
    }

    fn spawn_with_store(store: Store) -> Self {
        let (tx, rx) = mpsc::channel(256);

        // Broadcast channel for state change notifications (history feeds subscribe)
        let (event_tx, _) = broadcast::channel(64);

        // Spawn the actor task
        tokio::spawn(actor_loop(store, rx));

        info!("StateManager spawned");

        Self { tx, event_tx }
    }

    /// Subscribe to state change events
    pub fn subscribe_events(&self) -> broadcast::Receiver<StateEvent> {
        self.event_tx.subscribe()
    }

    async fn request<T>(&self, build: impl FnOnce(oneshot::Sender<StateResponse<T>>) -> StateCommand) -> StateResponse<T> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(build(reply_tx))
            .await
            .map_err(|_| StateError::ChannelError)?;
        reply_rx.await.map_err(|_| StateError::ChannelError)?
    }

    // === Petition operations ===

    /// Persist a new petition record
    pub async fn create_petition(&self, record: PetitionRecord) -> StateResponse<String> {
        debug!(record_id = %record.id, owner_id = %record.owner_id, "create_petition: called");
        let app_id = record.app_id.clone();
        let owner_id = record.owner_id.clone();

        let result = self
            .request(|reply| StateCommand::CreatePetition { record, reply })
            .await;

        // Broadcast so live history views refresh
        if let Ok(id) = &result {
            let _ = self.event_tx.send(StateEvent::PetitionCreated {
                app_id,
                owner_id,
                id: id.clone(),
            });
        }

        result
    }

    /// Get a petition record by id
    pub async fn get_petition(&self, id: &str) -> StateResponse<Option<PetitionRecord>> {
        debug!(%id, "get_petition: called");
        self.request(|reply| StateCommand::GetPetition { id: id.to_string(), reply })
            .await
    }

    /// All petitions owned by `owner_id` within `app_id`, in store order
    pub async fn list_petitions(&self, app_id: &str, owner_id: &str) -> StateResponse<Vec<PetitionRecord>> {
        debug!(%app_id, %owner_id, "list_petitions: called");
        self.request(|reply| StateCommand::ListPetitions {
            app_id: app_id.to_string(),
            owner_id: owner_id.to_string(),
            reply,
        })
        .await
    }

    // === Profile operations ===

    /// Write (insert or replace) a profile
    pub async fn put_profile(&self, profile: Profile) -> StateResponse<()> {
        debug!(profile_id = %profile.id, "put_profile: called");
        let uid = profile.uid.clone();
        let result = self.request(|reply| StateCommand::PutProfile { profile, reply }).await;
        if result.is_ok() {
            let _ = self.event_tx.send(StateEvent::ProfileWritten { uid });
        }
        result
    }

    pub async fn get_profile(&self, app_id: &str, uid: &str) -> StateResponse<Option<Profile>> {
        debug!(%app_id, %uid, "get_profile: called");
        let id = Profile::key(app_id, uid);
        self.request(|reply| StateCommand::GetProfile { id, reply }).await
    }

    // === Local identity operations ===

    /// Register an account; `None` if its email is already taken
    pub async fn create_account_if_absent(&self, account: UserAccount) -> StateResponse<Option<String>> {
        debug!(account_id = %account.id, "create_account_if_absent: called");
        self.request(|reply| StateCommand::CreateAccountIfAbsent { account, reply })
            .await
    }

    pub async fn get_account(&self, id: &str) -> StateResponse<Option<UserAccount>> {
        debug!(%id, "get_account: called");
        self.request(|reply| StateCommand::GetAccount { id: id.to_string(), reply })
            .await
    }

    /// Look an account up by its normalized email
    pub async fn find_account_by_email(&self, email: &str) -> StateResponse<Option<UserAccount>> {
        debug!(%email, "find_account_by_email: called");
        self.request(|reply| StateCommand::FindAccountByEmail {
            email: UserAccount::normalize_email(email),
            reply,
        })
        .await
    }

    pub async fn create_custom_token(&self, token: CustomToken) -> StateResponse<String> {
        debug!(uid = %token.uid, "create_custom_token: called");
        self.request(|reply| StateCommand::CreateCustomToken { token, reply })
            .await
    }

    /// Consume a custom token; `None` if unknown or already used
    pub async fn take_custom_token(&self, token: &str) -> StateResponse<Option<CustomToken>> {
        debug!("take_custom_token: called");
        self.request(|reply| StateCommand::TakeCustomToken {
            token: token.to_string(),
            reply,
        })
        .await
    }

    /// Changes only when another writer (e.g. another process) commits
    pub async fn data_version(&self) -> StateResponse<i64> {
        self.request(|reply| StateCommand::DataVersion { reply }).await
    }

    /// Stop the actor; later requests fail with `ChannelError`
    pub async fn shutdown(&self) -> Result<(), StateError> {
        debug!("shutdown: called");
        self.tx
            .send(StateCommand::Shutdown)
            .await
            .map_err(|_| StateError::ChannelError)
    }
}

/// Actor loop - owns the store, serializes all access to it
async fn actor_loop(mut store: Store, mut rx: mpsc::Receiver<StateCommand>) {
    debug!("StateManager actor started");

    while let Some(cmd) = rx.recv().await {
        match cmd {
            StateCommand::CreatePetition { record, reply } => {
                debug!(record_id = %record.id, "actor_loop: CreatePetition command");
                let result = store.create(record).map_err(|e| StateError::StoreError(e.to_string()));
                let _ = reply.send(result);
            }

            StateCommand::GetPetition { id, reply } => {
                debug!(%id, "actor_loop: GetPetition command");
                let result: StateResponse<Option<PetitionRecord>> =
                    store.get(&id).map_err(|e| StateError::StoreError(e.to_string()));
                let _ = reply.send(result);
            }

            StateCommand::ListPetitions {
                app_id,
                owner_id,
                reply,
            } => {
                debug!(%app_id, %owner_id, "actor_loop: ListPetitions command");
                let filters = [Filter::eq("app_id", app_id), Filter::eq("owner", owner_id)];
                let result: StateResponse<Vec<PetitionRecord>> =
                    store.list(&filters).map_err(|e| StateError::StoreError(e.to_string()));
                let _ = reply.send(result);
            }

            StateCommand::PutProfile { profile, reply } => {
                debug!(profile_id = %profile.id, "actor_loop: PutProfile command");
                let result = store.put(profile).map_err(|e| StateError::StoreError(e.to_string()));
                let _ = reply.send(result);
            }

            StateCommand::GetProfile { id, reply } => {
                debug!(%id, "actor_loop: GetProfile command");
                let result: StateResponse<Option<Profile>> =
                    store.get(&id).map_err(|e| StateError::StoreError(e.to_string()));
                let _ = reply.send(result);
            }

            StateCommand::CreateAccountIfAbsent { account, reply } => {
                debug!(account_id = %account.id, "actor_loop: CreateAccountIfAbsent command");
                let result = store
                    .create_unique(account, "email")
                    .map_err(|e| StateError::StoreError(e.to_string()));
                let _ = reply.send(result);
            }

            StateCommand::GetAccount { id, reply } => {
                debug!(%id, "actor_loop: GetAccount command");
                let result: StateResponse<Option<UserAccount>> =
                    store.get(&id).map_err(|e| StateError::StoreError(e.to_string()));
                let _ = reply.send(result);
            }

            StateCommand::FindAccountByEmail { email, reply } => {
                debug!(%email, "actor_loop: FindAccountByEmail command");
                let result: StateResponse<Option<UserAccount>> = store
                    .list(&[Filter::eq("email", email)])
                    .map(|accounts: Vec<UserAccount>| accounts.into_iter().next())
                    .map_err(|e| StateError::StoreError(e.to_string()));
                let _ = reply.send(result);
            }

            StateCommand::CreateCustomToken { token, reply } => {
                debug!(uid = %token.uid, "actor_loop: CreateCustomToken command");
                let result = store.create(token).map_err(|e| StateError::StoreError(e.to_string()));
                let _ = reply.send(result);
            }

            StateCommand::TakeCustomToken { token, reply } => {
                debug!("actor_loop: TakeCustomToken command");
                let result = take_token(&mut store, &token).map_err(|e| StateError::StoreError(e.to_string()));
                let _ = reply.send(result);
            }

            StateCommand::DataVersion { reply } => {
                let result = store.data_version().map_err(|e| StateError::StoreError(e.to_string()));
                let _ = reply.send(result);
            }

            StateCommand::Shutdown => {
                info!("StateManager shutting down");
                break;
            }
        }
    }

    debug!("StateManager actor stopped");
}

/// Only the caller whose delete removed the row gets the token
fn take_token(store: &mut Store, token: &str) -> eyre::Result<Option<CustomToken>> {
    let found: Option<CustomToken> = store.get(token)?;
    match found {
        Some(custom) if store.delete::<CustomToken>(token)? => Ok(Some(custom)),
        _ => Ok(None),
    }
}
