use axum::{extract::State, response::Html};
use std::sync::Arc;

use influxdb_axum::{context, views};

use super::jobs::{perform_later, MetricJob};
use super::AppError;
use crate::AppState;

const ITEMS: &[&str] = &["alpha", "beta", "gamma"];

// ─── GET /metrics ────────────────────────────────────────────────
/// Renders a small page through a template and a partial per item, and
/// queues a `MetricJob` on the way. Every step shows up as a metric.
pub async fn index(State(state): State<Arc<AppState>>) -> Result<Html<String>, AppError> {
    context::set_location("MetricsController#index");
    context::add_tag("additional_tag", "value");
    context::add_value("additional_value", "value");

    perform_later(&state, MetricJob { items: ITEMS.len() }).await?;

    let inst = &state.instrumenter;
    let page = views::render_template(inst, "views/metrics/index.html", async {
        let mut rows = String::new();
        for item in ITEMS {
            let row = views::render_partial(inst, "views/metrics/_item.html", async {
                format!("<li>{item}</li>")
            })
            .await;
            rows.push_str(&row);
        }
        format!("<ul>{rows}</ul>")
    })
    .await;

    Ok(Html(page))
}
