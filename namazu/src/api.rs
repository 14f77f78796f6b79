//! Management HTTP surface for subscriptions.
//!
//! A new or re-pointed webhook must pass URL validation and the ownership
//! challenge before it is stored. Secrets are accepted on input and never
//! echoed back.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use namazu_types::{
    Delivery, DeliveryType, Filter, RepositoryError, RetryPolicy, Subscription, SubscriptionStore,
};
use namazu_webhook::{validate_webhook_url, Challenger, DEFAULT_TIMEOUT};
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use warp::http::StatusCode;
use warp::{Filter as _, Rejection, Reply};

use crate::error::ServerError;

/// Largest accepted request body.
const MAX_BODY_BYTES: u64 = 64 * 1024;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct ApiContext {
    store: Arc<dyn SubscriptionStore>,
    challenger: Challenger,
    allow_local_webhooks: bool,
    challenge_timeout: Duration,
    cancel: CancellationToken,
}

impl ApiContext {
    pub fn new(
        store: Arc<dyn SubscriptionStore>,
        challenger: Challenger,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            store,
            challenger,
            allow_local_webhooks: false,
            challenge_timeout: DEFAULT_TIMEOUT,
            cancel,
        }
    }

    pub fn with_allow_local_webhooks(mut self, allow: bool) -> Self {
        self.allow_local_webhooks = allow;
        self
    }

    pub fn with_challenge_timeout(mut self, timeout: Duration) -> Self {
        self.challenge_timeout = timeout;
        self
    }
}

/// Body of `POST /subscriptions` and `PUT /subscriptions/{id}`.
#[derive(Debug, Clone, Deserialize)]
pub struct SubscriptionRequest {
    #[serde(default)]
    pub owner: String,
    #[serde(default)]
    pub name: String,
    pub delivery: Delivery,
    #[serde(default)]
    pub filter: Option<Filter>,
}

/// A subscription as returned to API clients, without its secret.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubscriptionView {
    pub id: String,
    pub owner: String,
    pub name: String,
    pub delivery: DeliveryView,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<Filter>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryView {
    #[serde(rename = "type")]
    pub delivery_type: DeliveryType,
    pub url: String,
    pub retry: RetryPolicy,
}

impl From<&Subscription> for SubscriptionView {
    fn from(subscription: &Subscription) -> Self {
        Self {
            id: subscription.id.clone(),
            owner: subscription.owner.clone(),
            name: subscription.name.clone(),
            delivery: DeliveryView {
                delivery_type: subscription.delivery.delivery_type,
                url: subscription.delivery.url.clone(),
                retry: subscription.delivery.retry_policy(),
            },
            filter: subscription.filter.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ListQuery {
    owner: Option<String>,
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

/// Handler failure carried through warp's rejection system.
#[derive(Debug)]
struct ApiRejection {
    status: StatusCode,
    message: String,
}

impl warp::reject::Reject for ApiRejection {}

fn reject(status: StatusCode, message: impl Into<String>) -> Rejection {
    warp::reject::custom(ApiRejection {
        status,
        message: message.into(),
    })
}

fn repository_rejection(error: RepositoryError) -> Rejection {
    match error {
        RepositoryError::NotFound(_) => reject(StatusCode::NOT_FOUND, error.to_string()),
        RepositoryError::AlreadyExists(_) => reject(StatusCode::CONFLICT, error.to_string()),
        RepositoryError::Storage(_) => {
            error!(error = %error, "Subscription store failed");
            reject(StatusCode::INTERNAL_SERVER_ERROR, "storage error")
        }
    }
}

/// All management routes, with rejections rendered as JSON errors.
pub fn routes(
    context: ApiContext,
) -> impl warp::Filter<Extract = (impl Reply,), Error = Infallible> + Clone {
    let with_context = warp::any().map(move || context.clone());
    let json_body = warp::body::content_length_limit(MAX_BODY_BYTES).and(warp::body::json());

    let health = warp::path!("health")
        .and(warp::get())
        .map(|| warp::reply::json(&serde_json::json!({ "status": "ok" })));

    let list = warp::path!("subscriptions")
        .and(warp::get())
        .and(warp::query::<ListQuery>())
        .and(with_context.clone())
        .and_then(list_subscriptions);

    let get = warp::path!("subscriptions" / String)
        .and(warp::get())
        .and(with_context.clone())
        .and_then(get_subscription);

    let create = warp::path!("subscriptions")
        .and(warp::post())
        .and(json_body.clone())
        .and(with_context.clone())
        .and_then(create_subscription);

    let update = warp::path!("subscriptions" / String)
        .and(warp::put())
        .and(json_body)
        .and(with_context.clone())
        .and_then(update_subscription);

    let delete = warp::path!("subscriptions" / String)
        .and(warp::delete())
        .and(with_context)
        .and_then(delete_subscription);

    health
        .or(list)
        .or(get)
        .or(create)
        .or(update)
        .or(delete)
        .recover(handle_rejection)
}

async fn list_subscriptions(
    query: ListQuery,
    context: ApiContext,
) -> Result<warp::reply::Json, Rejection> {
    let subscriptions = match query.owner.as_deref() {
        Some(owner) => context.store.list_by_owner(owner).await,
        None => context.store.list_all().await,
    }
    .map_err(repository_rejection)?;

    let views: Vec<SubscriptionView> = subscriptions.iter().map(SubscriptionView::from).collect();
    Ok(warp::reply::json(&views))
}

async fn get_subscription(id: String, context: ApiContext) -> Result<warp::reply::Json, Rejection> {
    let subscription = context.store.get(&id).await.map_err(repository_rejection)?;
    Ok(warp::reply::json(&SubscriptionView::from(&subscription)))
}

async fn create_subscription(
    request: SubscriptionRequest,
    context: ApiContext,
) -> Result<impl Reply, Rejection> {
    let subscription = Subscription {
        id: uuid::Uuid::new_v4().to_string(),
        owner: request.owner,
        name: request.name,
        delivery: request.delivery,
        filter: request.filter,
    };

    admit(&context, &subscription, true).await?;
    context
        .store
        .create(subscription.clone())
        .await
        .map_err(repository_rejection)?;

    info!(
        subscription_id = %subscription.id,
        owner = %subscription.owner,
        url = %subscription.delivery.url,
        "Subscription created"
    );
    Ok(warp::reply::with_status(
        warp::reply::json(&SubscriptionView::from(&subscription)),
        StatusCode::CREATED,
    ))
}

async fn update_subscription(
    id: String,
    request: SubscriptionRequest,
    context: ApiContext,
) -> Result<warp::reply::Json, Rejection> {
    let existing = context.store.get(&id).await.map_err(repository_rejection)?;

    let subscription = Subscription {
        id,
        owner: request.owner,
        name: request.name,
        delivery: request.delivery,
        filter: request.filter,
    };

    let endpoint_changed = subscription.delivery.url != existing.delivery.url
        || subscription.delivery.secret != existing.delivery.secret;
    admit(&context, &subscription, endpoint_changed).await?;

    context
        .store
        .update(subscription.clone())
        .await
        .map_err(repository_rejection)?;

    info!(
        subscription_id = %subscription.id,
        rechallenged = endpoint_changed,
        "Subscription updated"
    );
    Ok(warp::reply::json(&SubscriptionView::from(&subscription)))
}

async fn delete_subscription(id: String, context: ApiContext) -> Result<impl Reply, Rejection> {
    context.store.delete(&id).await.map_err(repository_rejection)?;
    info!(subscription_id = %id, "Subscription deleted");
    Ok(warp::reply::with_status(warp::reply(), StatusCode::NO_CONTENT))
}

/// Structural checks, URL policy and, when `challenge` is set, the ownership
/// handshake.
async fn admit(
    context: &ApiContext,
    subscription: &Subscription,
    challenge: bool,
) -> Result<(), Rejection> {
    subscription
        .validate()
        .map_err(|e| reject(StatusCode::BAD_REQUEST, e.to_string()))?;

    let url = &subscription.delivery.url;
    validate_webhook_url(url, context.allow_local_webhooks)
        .map_err(|e| reject(StatusCode::BAD_REQUEST, format!("invalid webhook URL: {e}")))?;

    if !challenge {
        return Ok(());
    }

    let result = context
        .challenger
        .verify(
            &context.cancel,
            url,
            subscription.delivery.secret.as_bytes(),
            context.challenge_timeout,
        )
        .await;

    if !result.success {
        let message = result
            .error_message
            .unwrap_or_else(|| "unknown error".to_string());
        warn!(url = %url, reason = %message, "Ownership challenge failed");
        return Err(reject(
            StatusCode::BAD_REQUEST,
            format!("challenge failed: {message}"),
        ));
    }
    Ok(())
}

/// Convert rejections into JSON error responses.
async fn handle_rejection(err: Rejection) -> Result<impl Reply, Infallible> {
    let (code, message) = if let Some(rejection) = err.find::<ApiRejection>() {
        (rejection.status, rejection.message.clone())
    } else if let Some(e) = err.find::<warp::filters::body::BodyDeserializeError>() {
        (StatusCode::BAD_REQUEST, format!("invalid request body: {e}"))
    } else if err.find::<warp::reject::PayloadTooLarge>().is_some() {
        (StatusCode::PAYLOAD_TOO_LARGE, "request body too large".to_string())
    } else if err.find::<warp::reject::LengthRequired>().is_some() {
        (StatusCode::LENGTH_REQUIRED, "content-length required".to_string())
    } else if err.find::<warp::reject::UnsupportedMediaType>().is_some() {
        (
            StatusCode::UNSUPPORTED_MEDIA_TYPE,
            "expected application/json".to_string(),
        )
    } else if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        (StatusCode::METHOD_NOT_ALLOWED, "method not allowed".to_string())
    } else if err.is_not_found() {
        (StatusCode::NOT_FOUND, "not found".to_string())
    } else {
        error!(rejection = ?err, "Unhandled rejection");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "internal server error".to_string(),
        )
    };

    Ok(warp::reply::with_status(
        warp::reply::json(&ErrorBody { error: message }),
        code,
    ))
}

/// Running management server.
pub struct ApiServer {
    addr: SocketAddr,
    shutdown: CancellationToken,
    handle: JoinHandle<()>,
}

impl ApiServer {
    /// Bind `addr` and serve [`routes`] until `cancel` fires or
    /// [`stop`](Self::stop) is called.
    pub fn start(
        addr: SocketAddr,
        context: ApiContext,
        cancel: &CancellationToken,
    ) -> Result<Self, ServerError> {
        let shutdown = cancel.child_token();
        let signal = shutdown.clone();

        let (bound, server) = warp::serve(routes(context))
            .try_bind_with_graceful_shutdown(addr, async move { signal.cancelled().await })?;

        info!(addr = %bound, "Management API listening");
        let handle = tokio::spawn(server);

        Ok(Self {
            addr: bound,
            shutdown,
            handle,
        })
    }

    /// Address actually bound, useful when started on port 0.
    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Stop accepting connections and wait for in-flight requests.
    pub async fn stop(self) {
        self.shutdown.cancel();
        match tokio::time::timeout(Duration::from_secs(5), self.handle).await {
            Ok(Ok(())) => info!("Management API stopped"),
            Ok(Err(e)) => warn!(error = %e, "Management API task failed"),
            Err(_) => warn!("Timed out waiting for management API to stop"),
        }
    }
}
