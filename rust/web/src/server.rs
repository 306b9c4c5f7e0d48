use std::convert::Infallible;
use std::net::{SocketAddr, ToSocketAddrs};
use std::sync::Arc;

use blackjack_ai::{Agent, AgentRuntime, GameBoundary};
use blackjack_engine::deck::{DeckProvider, LocalDeckService, TimedDeck};
use thiserror::Error;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use warp::filters::body::BodyDeserializeError;
use warp::filters::BoxedFilter;
use warp::http::StatusCode;
use warp::reply::{Reply, Response};
use warp::{reject, Filter, Rejection};

use crate::errors::ErrorResponse;
use crate::handlers;
use crate::service::GameService;
use crate::settings::{ConfigError, ServiceSettings};
use crate::store::GameStore;

/// Request bodies are small JSON documents.
const MAX_BODY_BYTES: u64 = 16 * 1024;

/// Shared state behind every route.
#[derive(Clone)]
pub struct AppContext {
    settings: ServiceSettings,
    service: Arc<GameService>,
}

impl AppContext {
    /// Builds the context with an in-process deck, bounded by the configured
    /// deck timeout.
    pub fn new(settings: ServiceSettings) -> Self {
        let local = match settings.deck_seed {
            Some(seed) => LocalDeckService::with_seed(seed),
            None => LocalDeckService::new(),
        };
        let deck: Arc<dyn DeckProvider> = Arc::new(TimedDeck::new(local, settings.deck_timeout()));
        Self::with_deck(settings, deck)
    }

    pub fn with_deck(settings: ServiceSettings, deck: Arc<dyn DeckProvider>) -> Self {
        let service = Arc::new(GameService::new(Arc::new(GameStore::new()), deck));
        Self { settings, service }
    }

    pub fn new_for_tests() -> Self {
        Self::new(ServiceSettings::for_tests())
    }

    pub fn settings(&self) -> &ServiceSettings {
        &self.settings
    }

    pub fn service(&self) -> Arc<GameService> {
        Arc::clone(&self.service)
    }

    pub fn store(&self) -> Arc<GameStore> {
        self.service.store()
    }

    /// Spawns the agent loop and connects it to the service.
    ///
    /// Must be called from within a Tokio runtime, at most once per context.
    pub fn start_agent(&self) -> Result<AgentRuntime, ServerError> {
        let boundary: Arc<dyn GameBoundary> = self.service.clone();
        let runtime = Agent::new(boundary, self.settings.agent_config()).spawn();
        if !self.service.attach_agent(runtime.handle()) {
            return Err(ServerError::AgentAlreadyRunning);
        }
        Ok(runtime)
    }
}

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Failed to bind to address: {0}")]
    BindError(#[from] std::io::Error),
    #[error("Configuration error: {0}")]
    ConfigError(String),
    #[error(transparent)]
    Settings(#[from] ConfigError),
    #[error("An agent is already attached to this context")]
    AgentAlreadyRunning,
}

#[derive(Clone)]
pub struct WebServer {
    context: AppContext,
}

impl WebServer {
    pub fn new(settings: ServiceSettings) -> Result<Self, ServerError> {
        settings.validate()?;
        Ok(Self::from_context(AppContext::new(settings)))
    }

    pub fn from_context(context: AppContext) -> Self {
        Self { context }
    }

    pub fn context(&self) -> &AppContext {
        &self.context
    }

    /// Starts the agent and binds the HTTP listener.
    pub async fn start(self) -> Result<ServerHandle, ServerError> {
        let WebServer { context } = self;
        let bind_addr = Self::bind_addr(context.settings())?;

        let agent = context.start_agent()?;

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let shutdown_signal = async move {
            let _ = shutdown_rx.await;
        };

        let (addr, server_future) = warp::serve(Self::app(&context))
            .try_bind_with_graceful_shutdown(bind_addr, shutdown_signal)
            .map_err(Self::map_warp_error)?;

        info!(%addr, "Blackjack server listening");

        let task = tokio::spawn(server_future);

        Ok(ServerHandle {
            addr,
            shutdown: Some(shutdown_tx),
            task: Some(task),
            agent: Some(agent),
            context,
        })
    }

    fn bind_addr(settings: &ServiceSettings) -> Result<SocketAddr, ServerError> {
        let host = settings.host.as_str();

        if let Ok(addr) = host.parse::<SocketAddr>() {
            return Ok(addr);
        }

        if let Ok(ip) = host.parse::<std::net::IpAddr>() {
            return Ok(SocketAddr::new(ip, settings.port));
        }

        let candidate = format!("{}:{}", host, settings.port);
        let mut addrs = candidate.to_socket_addrs().map_err(|err| {
            ServerError::ConfigError(format!("failed to resolve address `{candidate}`: {err}"))
        })?;

        addrs.next().ok_or_else(|| {
            ServerError::ConfigError(format!("failed to resolve address `{candidate}`"))
        })
    }

    fn map_warp_error(err: warp::Error) -> ServerError {
        use std::error::Error as StdError;

        if let Some(io_err) = err
            .source()
            .and_then(|source| source.downcast_ref::<std::io::Error>())
        {
            return ServerError::BindError(std::io::Error::new(io_err.kind(), io_err.to_string()));
        }

        ServerError::ConfigError(err.to_string())
    }

    /// Every route plus JSON rendering of rejections.
    pub fn app(
        context: &AppContext,
    ) -> impl Filter<Extract = (Response,), Error = Infallible> + Clone + Send + Sync + 'static
    {
        Self::routes(context).recover(handle_rejection).unify()
    }

    pub fn routes(context: &AppContext) -> BoxedFilter<(Response,)> {
        Self::health_route(context)
            .or(Self::game_routes(context))
            .unify()
            .boxed()
    }

    fn health_route(context: &AppContext) -> BoxedFilter<(Response,)> {
        warp::path("health")
            .and(warp::get())
            .and(warp::path::end())
            .and(Self::with_service(context.service()))
            .map(|service: Arc<GameService>| {
                handlers::health(service.store().len()).into_response()
            })
            .boxed()
    }

    fn game_routes(context: &AppContext) -> BoxedFilter<(Response,)> {
        let service = context.service();

        let create = warp::path!("api" / "games")
            .and(warp::post())
            .and(Self::with_service(service.clone()))
            .and(Self::json_body::<handlers::CreateGameRequest>())
            .and_then(
                |service: Arc<GameService>, request: handlers::CreateGameRequest| async move {
                    Ok::<_, Infallible>(handlers::create_game(service, request).await)
                },
            );

        let view = warp::path!("api" / "games" / String)
            .and(warp::get())
            .and(Self::with_service(service.clone()))
            .and(warp::query::<handlers::ViewQuery>())
            .and_then(
                |game_id: String, service: Arc<GameService>, query: handlers::ViewQuery| async move {
                    Ok::<_, Infallible>(handlers::get_game(service, game_id, query).await)
                },
            );

        let turns = warp::path!("api" / "games" / String / "turns")
            .and(warp::post())
            .and(Self::with_service(service.clone()))
            .and(Self::json_body::<handlers::TurnRequest>())
            .and_then(
                |game_id: String, service: Arc<GameService>, request: handlers::TurnRequest| async move {
                    Ok::<_, Infallible>(handlers::play_turn(service, game_id, request).await)
                },
            );

        let register = warp::path!("api" / "games" / String / "auto-players")
            .and(warp::post())
            .and(Self::with_service(service.clone()))
            .and(Self::json_body::<handlers::AutoPlayerRequest>())
            .and_then(
                |game_id: String,
                 service: Arc<GameService>,
                 request: handlers::AutoPlayerRequest| async move {
                    Ok::<_, Infallible>(
                        handlers::register_auto_player(service, game_id, request).await,
                    )
                },
            );

        let auto_players = warp::path!("api" / "auto-players")
            .and(warp::get())
            .and(Self::with_service(service))
            .and_then(|service: Arc<GameService>| async move {
                Ok::<_, Infallible>(handlers::list_auto_players(service).await)
            });

        create
            .or(view)
            .unify()
            .or(turns)
            .unify()
            .or(register)
            .unify()
            .or(auto_players)
            .unify()
            .boxed()
    }

    fn with_service(
        service: Arc<GameService>,
    ) -> impl Filter<Extract = (Arc<GameService>,), Error = Infallible> + Clone {
        warp::any().map(move || Arc::clone(&service))
    }

    fn json_body<T>() -> impl Filter<Extract = (T,), Error = Rejection> + Clone
    where
        T: serde::de::DeserializeOwned + Send,
    {
        warp::body::content_length_limit(MAX_BODY_BYTES).and(warp::body::json())
    }
}

async fn handle_rejection(err: Rejection) -> Result<Response, Infallible> {
    let (status, body) = if err.is_not_found() {
        (
            StatusCode::NOT_FOUND,
            ErrorResponse::new("not_found", "No such route"),
        )
    } else if let Some(cause) = err.find::<BodyDeserializeError>() {
        (
            StatusCode::BAD_REQUEST,
            ErrorResponse::new("invalid_request", cause.to_string()),
        )
    } else if let Some(cause) = err.find::<reject::InvalidQuery>() {
        (
            StatusCode::BAD_REQUEST,
            ErrorResponse::new("invalid_query", cause.to_string()),
        )
    } else if err.find::<reject::PayloadTooLarge>().is_some() {
        (
            StatusCode::PAYLOAD_TOO_LARGE,
            ErrorResponse::new("payload_too_large", "Request body too large"),
        )
    } else if err.find::<reject::UnsupportedMediaType>().is_some() {
        (
            StatusCode::UNSUPPORTED_MEDIA_TYPE,
            ErrorResponse::new("unsupported_media_type", "Expected a JSON body"),
        )
    } else if err.find::<reject::MethodNotAllowed>().is_some() {
        (
            StatusCode::METHOD_NOT_ALLOWED,
            ErrorResponse::new("method_not_allowed", "Method not allowed"),
        )
    } else {
        warn!(rejection = ?err, "Unhandled rejection");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            ErrorResponse::new("internal_error", "Unhandled request"),
        )
    };
    Ok(body.into_response(status))
}

/// A running server. Dropping it stops both the listener and the agent
/// without waiting; [`ServerHandle::shutdown`] waits for both.
pub struct ServerHandle {
    addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
    agent: Option<AgentRuntime>,
    context: AppContext,
}

impl ServerHandle {
    pub fn address(&self) -> SocketAddr {
        self.addr
    }

    pub fn context(&self) -> &AppContext {
        &self.context
    }

    pub async fn shutdown(mut self) -> Result<(), ServerError> {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }

        if let Some(task) = self.task.take() {
            task.await.map_err(|err| {
                ServerError::ConfigError(format!("server task join error: {err}"))
            })?;
        }

        if let Some(agent) = self.agent.take() {
            agent.shutdown().await;
        }

        info!(addr = %self.addr, "Blackjack server stopped");
        Ok(())
    }
}

impl Drop for ServerHandle {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }

        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
