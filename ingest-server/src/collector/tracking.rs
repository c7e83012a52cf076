//! Tracking reconciliation decisions
//!
//! Pure decision logic for Step E/F writes; the orchestrator owns the
//! API calls and pacing. History rows are attached afterwards from the
//! detailed event lookup.

use shared::models::order::HistoryUpsert;
use shared::util::opt_secs_to_millis;
use shopee_client::types::{TrackingInfoResponse, TrackingNumberResponse};

use crate::db::orders::{needs_shipped_transition, ReconcileCandidate, TrackingUpdate};

/// Decide whether a tracking-number response warrants a write for
/// `candidate`.
///
/// No write when the marketplace has no tracking number yet, or when the
/// database already holds the same value (idempotence).
pub fn decide_update(
    candidate: &ReconcileCandidate,
    resp: &TrackingNumberResponse,
) -> Option<TrackingUpdate> {
    let tracking_no = resp.derive_tracking_number()?;
    if candidate.tracking_no.as_deref() == Some(tracking_no.as_str()) {
        return None;
    }

    Some(TrackingUpdate {
        order_id: candidate.id,
        carrier_name: resp.derive_carrier(),
        mark_shipped: needs_shipped_transition(&candidate.status),
        histories: vec![],
        tracking_no,
    })
}

/// Project detailed tracking events into history rows for the dedup upsert.
pub fn histories_from(info: &TrackingInfoResponse, tracking_no: &str) -> Vec<HistoryUpsert> {
    info.tracking_info
        .iter()
        .filter_map(|event| {
            let event_time = opt_secs_to_millis(event.update_time)?;
            Some(HistoryUpsert {
                tracking_no: tracking_no.to_string(),
                event_time,
                location: event.description.clone().filter(|d| !d.is_empty()),
                status: event
                    .logistics_status
                    .clone()
                    .unwrap_or_else(|| "UNKNOWN".to_string()),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use shopee_client::types::TrackingEvent;
    use uuid::Uuid;

    fn candidate(status: &str, tracking: Option<&str>) -> ReconcileCandidate {
        ReconcileCandidate {
            id: Uuid::new_v4(),
            order_num: "250515ABC".into(),
            status: status.into(),
            tracking_no: tracking.map(String::from),
        }
    }

    fn resp(tracking: Option<&str>, carrier: Option<&str>) -> TrackingNumberResponse {
        TrackingNumberResponse {
            tracking_number: tracking.map(String::from),
            shipping_provider_name: carrier.map(String::from),
            ..Default::default()
        }
    }

    #[test]
    fn test_fresh_tracking_produces_update() {
        let update = decide_update(
            &candidate("PROCESSED", None),
            &resp(Some("TN9"), Some("DHL")),
        )
        .unwrap();
        assert_eq!(update.tracking_no, "TN9");
        assert_eq!(update.carrier_name.as_deref(), Some("DHL"));
        assert!(update.mark_shipped);
    }

    #[test]
    fn test_identical_tracking_issues_no_write() {
        assert!(decide_update(
            &candidate("SHIPPED", Some("TN9")),
            &resp(Some("TN9"), None)
        )
        .is_none());
    }

    #[test]
    fn test_no_tracking_number_no_write() {
        assert!(decide_update(&candidate("PROCESSED", None), &resp(None, Some("DHL"))).is_none());
    }

    #[test]
    fn test_shipped_order_not_retransitioned() {
        let update = decide_update(
            &candidate("SHIPPED", Some("OLD1")),
            &resp(Some("TN9"), None),
        )
        .unwrap();
        assert!(!update.mark_shipped);
        // Carrier absent upstream: the write carries None and the SQL layer
        // preserves the existing name.
        assert!(update.carrier_name.is_none());
    }

    #[test]
    fn test_fallback_number_fields_reach_update() {
        let mut response = resp(None, None);
        response.last_mile_tracking_number = Some("LM7".into());
        let update = decide_update(&candidate("PROCESSED", None), &response).unwrap();
        assert_eq!(update.tracking_no, "LM7");
    }

    #[test]
    fn test_histories_require_event_time() {
        let info = TrackingInfoResponse {
            tracking_number: Some("TN9".into()),
            tracking_info: vec![
                TrackingEvent {
                    update_time: Some(1_747_267_200),
                    description: Some("Parcel picked up".into()),
                    logistics_status: Some("PICKED_UP".into()),
                },
                TrackingEvent {
                    update_time: None,
                    description: Some("dropped".into()),
                    logistics_status: None,
                },
            ],
            ..Default::default()
        };
        let histories = histories_from(&info, "TN9");
        assert_eq!(histories.len(), 1);
        assert_eq!(histories[0].event_time, 1_747_267_200_000);
        assert_eq!(histories[0].status, "PICKED_UP");
    }
}
