//! Basic example demonstrating the directory gate middleware.
//!
//! Run with: `cargo run --example basic`
//!
//! Test with:
//! ```sh
//! # Public page (no rule, allowed for everyone)
//! curl http://localhost:3000/
//!
//! # Members area as an editor (allowed by role)
//! curl -H "X-User-Roles: editor" http://localhost:3000/members/reports
//!
//! # Members area as a subscriber (403)
//! curl -H "X-User-Roles: subscriber" http://localhost:3000/members/reports
//!
//! # Members area anonymously (403 unless your IP is listed)
//! curl http://localhost:3000/members/reports
//!
//! # Administrator bypasses the gate entirely
//! curl -H "X-User-Roles: administrator" http://localhost:3000/members/reports
//! ```

use axum::{routing::get, Router};
use axum_dirgate::{DirGateLayer, Group, JsonDeniedHandler, Rule, RuleSet, UserIpEntry};
use std::net::SocketAddr;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

async fn home() -> &'static str {
    "Public home page"
}

async fn members_reports() -> &'static str {
    "Members-only reports"
}

async fn members_downloads() -> &'static str {
    "Members-only downloads"
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            "axum_dirgate=debug,basic=debug".into()
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Protect /members and everything under it. Editors get in by role;
    // the office IP gets in regardless of login state.
    let rules = RuleSet::builder()
        .rule(
            Rule::new("/members")
                .restrict_children(true)
                .allow_role("editor")
                .group(
                    Group::new("office")
                        .user(UserIpEntry::from_text("alice", "203.0.113.7\n203.0.113.8")),
                ),
        )
        .build();

    let app = Router::new()
        .route("/", get(home))
        .route("/members/reports", get(members_reports))
        .route("/members/downloads", get(members_downloads))
        .layer(
            DirGateLayer::new(rules)
                .with_bypass_role("administrator")
                .with_denied_handler(JsonDeniedHandler::new()),
        );

    let addr = SocketAddr::from(([0, 0, 0, 0], 3000));
    tracing::info!("listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .unwrap();
}
