use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::entities::RepairOrderStatus;

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event asynchronously
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }

    /// Sends an event, logging instead of failing when the channel is closed.
    /// Business writes have already been committed by the time events go out.
    pub async fn send_or_log(&self, event: Event) {
        if let Err(e) = self.send(event).await {
            warn!(error = %e, "dropping domain event");
        }
    }
}

/// Which commercial document touched a repair order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
pub enum LinkedDocumentKind {
    Task,
    Timesheet,
    #[strum(serialize = "Purchase Invoice")]
    PurchaseInvoice,
    Quotation,
    #[strum(serialize = "Sales Order")]
    SalesOrder,
    #[strum(serialize = "Sales Invoice")]
    SalesInvoice,
    #[strum(serialize = "Stock Entry")]
    StockEntry,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    RepairOrderCreated {
        repair_order_id: Uuid,
        name: String,
    },
    RepairOrderSubmitted {
        repair_order_id: Uuid,
        project_id: Option<Uuid>,
        tasks_created: usize,
    },
    RepairOrderStatusChanged {
        repair_order_id: Uuid,
        old_status: RepairOrderStatus,
        new_status: RepairOrderStatus,
    },
    RepairOrderCancelled(Uuid),
    CostsRecomputed {
        repair_order_id: Uuid,
        total_job_cost: Decimal,
        gross_margin: Decimal,
    },
    JobCostingRefreshed {
        refreshed: usize,
        failed: usize,
        at: DateTime<Utc>,
    },
    LinkedDocumentSubmitted {
        kind: LinkedDocumentKind,
        document_id: Uuid,
        repair_order_id: Option<Uuid>,
    },
    LinkedDocumentCancelled {
        kind: LinkedDocumentKind,
        document_id: Uuid,
        repair_order_id: Option<Uuid>,
    },
}

impl Event {
    fn kind(&self) -> &'static str {
        match self {
            Event::RepairOrderCreated { .. } => "repair_order_created",
            Event::RepairOrderSubmitted { .. } => "repair_order_submitted",
            Event::RepairOrderStatusChanged { .. } => "repair_order_status_changed",
            Event::RepairOrderCancelled(_) => "repair_order_cancelled",
            Event::CostsRecomputed { .. } => "costs_recomputed",
            Event::JobCostingRefreshed { .. } => "job_costing_refreshed",
            Event::LinkedDocumentSubmitted { .. } => "linked_document_submitted",
            Event::LinkedDocumentCancelled { .. } => "linked_document_cancelled",
        }
    }
}

/// Drains the event channel, logging each event and counting it by kind.
pub async fn process_events(mut rx: mpsc::Receiver<Event>) {
    info!("Starting event processing loop");

    while let Some(event) = rx.recv().await {
        metrics::counter!("repairshop.events", 1, "kind" => event.kind());

        match &event {
            Event::RepairOrderCreated {
                repair_order_id,
                name,
            } => {
                info!(%repair_order_id, %name, "repair order created");
            }
            Event::RepairOrderSubmitted {
                repair_order_id,
                project_id,
                tasks_created,
            } => {
                info!(
                    %repair_order_id,
                    project_id = ?project_id,
                    tasks_created,
                    "repair order submitted"
                );
            }
            Event::RepairOrderStatusChanged {
                repair_order_id,
                old_status,
                new_status,
            } => {
                info!(
                    %repair_order_id,
                    old_status = %old_status,
                    new_status = %new_status,
                    "repair order status changed"
                );
            }
            Event::RepairOrderCancelled(repair_order_id) => {
                info!(%repair_order_id, "repair order cancelled");
            }
            Event::CostsRecomputed {
                repair_order_id,
                total_job_cost,
                gross_margin,
            } => {
                if gross_margin.is_sign_negative() {
                    warn!(
                        %repair_order_id,
                        %total_job_cost,
                        %gross_margin,
                        "repair order is running at a loss"
                    );
                } else {
                    info!(%repair_order_id, %total_job_cost, %gross_margin, "costs recomputed");
                }
            }
            Event::JobCostingRefreshed {
                refreshed,
                failed,
                at,
            } => {
                if *failed > 0 {
                    warn!(refreshed, failed, at = %at, "job costing refresh finished with failures");
                } else {
                    info!(refreshed, at = %at, "job costing refresh finished");
                }
            }
            Event::LinkedDocumentSubmitted {
                kind,
                document_id,
                repair_order_id,
            } => {
                info!(
                    kind = %kind,
                    %document_id,
                    repair_order_id = ?repair_order_id,
                    "linked document submitted"
                );
            }
            Event::LinkedDocumentCancelled {
                kind,
                document_id,
                repair_order_id,
            } => {
                info!(
                    kind = %kind,
                    %document_id,
                    repair_order_id = ?repair_order_id,
                    "linked document cancelled"
                );
            }
        }
    }

    warn!("Event processing loop has ended");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn events_reach_the_receiver_in_order() {
        let (tx, mut rx) = mpsc::channel(4);
        let sender = EventSender::new(tx);
        let id = Uuid::new_v4();

        sender
            .send(Event::RepairOrderCreated {
                repair_order_id: id,
                name: "RO-0001".into(),
            })
            .await
            .unwrap();
        sender.send(Event::RepairOrderCancelled(id)).await.unwrap();

        assert!(matches!(
            rx.recv().await,
            Some(Event::RepairOrderCreated { repair_order_id, .. }) if repair_order_id == id
        ));
        assert!(matches!(rx.recv().await, Some(Event::RepairOrderCancelled(_))));
    }

    #[tokio::test]
    async fn send_fails_once_receiver_is_gone() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let sender = EventSender::new(tx);

        assert!(sender.send(Event::RepairOrderCancelled(Uuid::nil())).await.is_err());
        sender.send_or_log(Event::RepairOrderCancelled(Uuid::nil())).await;
    }

    #[test]
    fn linked_document_kinds_use_document_names() {
        assert_eq!(LinkedDocumentKind::PurchaseInvoice.to_string(), "Purchase Invoice");
        assert_eq!(LinkedDocumentKind::Timesheet.to_string(), "Timesheet");
    }
}
