use tower::ServiceBuilder;
use tower::layer::util::{Identity, Stack};
use tower_http::{
    classify::{ServerErrorsAsFailures, SharedClassifier},
    cors::{Any, CorsLayer},
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

type Tracing = TraceLayer<SharedClassifier<ServerErrorsAsFailures>>;

/// Request spans at INFO and an open CORS policy; the dashboard frontend is
/// served from a different origin in development.
pub fn create_middleware_stack() -> ServiceBuilder<Stack<CorsLayer, Stack<Tracing, Identity>>> {
    let tracing = TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
        .on_response(DefaultOnResponse::new().level(Level::INFO));
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);
    ServiceBuilder::new().layer(tracing).layer(cors)
}
