//! Client facade
//!
//! Wires one REST client, one dispatcher, one optional state cache and one
//! gateway session around a shared [`TaskSupervisor`].

use cord_cache::{State, StateError, StateResult};
use cord_common::{ClientConfig, TaskSupervisor};
use cord_core::{
    Channel, Event, EventPayload, EventSink, Guild, Member, Message, Permissions, Role,
};
use cord_http::RestClient;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::dispatcher::{Dispatcher, HandlerRegistration};
use crate::error::GatewayResult;
use crate::session::{GatewaySession, SubConnection};

/// A connected (or connectable) chat client
#[derive(Debug)]
pub struct Client {
    rest: Arc<RestClient>,
    dispatcher: Arc<Dispatcher>,
    state: Option<Arc<State>>,
    session: Arc<GatewaySession>,
    supervisor: Arc<TaskSupervisor>,
    shutdown_grace: Duration,
}

impl Client {
    /// Build a client with a state cache configured by `config.state`
    pub fn new(config: ClientConfig) -> GatewayResult<Self> {
        let state = Arc::new(State::new(config.state));
        Self::build(config, Some(state))
    }

    /// Build a client that keeps no state cache
    ///
    /// Cache accessors then fail with [`StateError::NotInitialized`].
    pub fn without_cache(config: ClientConfig) -> GatewayResult<Self> {
        Self::build(config, None)
    }

    fn build(config: ClientConfig, state: Option<Arc<State>>) -> GatewayResult<Self> {
        let shutdown_grace = config.shutdown_grace;
        let supervisor = Arc::new(TaskSupervisor::new());
        let dispatcher = Arc::new(Dispatcher::new(state.clone(), Arc::clone(&supervisor)));
        let rest = Arc::new(RestClient::new(
            config.rest,
            Arc::clone(&supervisor),
            Arc::clone(&dispatcher) as Arc<dyn EventSink>,
        )?);
        let session = Arc::new(GatewaySession::new(
            config.gateway,
            Arc::clone(&rest),
            Arc::clone(&dispatcher),
            Arc::clone(&supervisor),
        ));

        Ok(Self {
            rest,
            dispatcher,
            state,
            session,
            supervisor,
            shutdown_grace,
        })
    }

    pub fn rest(&self) -> &Arc<RestClient> {
        &self.rest
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    pub fn session(&self) -> &Arc<GatewaySession> {
        &self.session
    }

    /// The state cache, or `NotInitialized` when built without one
    pub fn state(&self) -> StateResult<&Arc<State>> {
        self.state.as_ref().ok_or(StateError::NotInitialized)
    }

    // ------------------------------------------------------------------
    // Handlers
    // ------------------------------------------------------------------

    pub fn add_handler<E, F, Fut>(&self, handler: F) -> HandlerRegistration
    where
        E: EventPayload,
        F: Fn(E) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.dispatcher.add_handler(handler)
    }

    pub fn add_handler_once<E, F, Fut>(&self, handler: F) -> HandlerRegistration
    where
        E: EventPayload,
        F: Fn(E) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.dispatcher.add_handler_once(handler)
    }

    pub fn add_any_handler<F, Fut>(&self, handler: F) -> HandlerRegistration
    where
        F: Fn(Arc<Event>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.dispatcher.add_any_handler(handler)
    }

    pub fn add_sub_connection(&self, sub: Arc<dyn SubConnection>) {
        self.session.add_sub_connection(sub);
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Open the gateway connection
    pub async fn open(&self) -> GatewayResult<()> {
        self.session.open().await
    }

    /// Close the gateway connection, then stop and join every background task
    ///
    /// Handlers already started, `Disconnect` included, get the configured
    /// shutdown grace to finish before they are aborted. The client cannot be
    /// reopened afterwards. Must not be called from an event handler.
    pub async fn close(&self) {
        self.session.close().await;
        self.supervisor.shutdown_with_grace(self.shutdown_grace).await;
        info!("client closed");
    }

    pub async fn update_status(&self, idle_since: i64, game: &str) -> GatewayResult<()> {
        self.session.update_status(idle_since, game).await
    }

    pub async fn update_streaming_status(&self, idle_since: i64, game: &str, url: &str) -> GatewayResult<()> {
        self.session.update_streaming_status(idle_since, game, url).await
    }

    // ------------------------------------------------------------------
    // Cache shortcuts
    // ------------------------------------------------------------------

    pub fn guild(&self, guild_id: &str) -> StateResult<Guild> {
        self.state()?.guild(guild_id)
    }

    pub fn channel(&self, channel_id: &str) -> StateResult<Channel> {
        self.state()?.channel(channel_id)
    }

    pub fn member(&self, guild_id: &str, user_id: &str) -> StateResult<Member> {
        self.state()?.member(guild_id, user_id)
    }

    pub fn role(&self, guild_id: &str, role_id: &str) -> StateResult<Role> {
        self.state()?.role(guild_id, role_id)
    }

    pub fn message(&self, channel_id: &str, message_id: &str) -> StateResult<Message> {
        self.state()?.message(channel_id, message_id)
    }

    pub fn user_channel_permissions(&self, user_id: &str, channel_id: &str) -> StateResult<Permissions> {
        self.state()?.user_channel_permissions(user_id, channel_id)
    }
}
