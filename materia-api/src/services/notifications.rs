//! Notification dispatcher
//!
//! Write paths hand a [`NotificationJob`] to the dispatcher after their
//! transaction commits. Jobs go through a bounded queue to a single
//! background worker holding its own pool handle, so delivery never
//! blocks or fails the triggering request. A job that cannot be queued or
//! delivered is logged and dropped.

use materia_common::db::{Notification, NotificationCategory};
use materia_common::{time, Result};
use sqlx::SqlitePool;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::db::{notifications, users};

/// Something happened that somebody should hear about
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationJob {
    Submitted {
        material_id: Uuid,
        material_name: String,
        author_id: String,
    },
    Edited {
        material_id: Uuid,
        material_name: String,
        editor_id: String,
        editor_is_admin: bool,
        creator_id: String,
    },
    Approved {
        material_id: Uuid,
        material_name: String,
        creator_id: String,
    },
    Rejected {
        material_id: Uuid,
        material_name: String,
        creator_id: String,
        reason: Option<String>,
    },
    Removed {
        material_name: String,
        creator_id: String,
        reason: Option<String>,
    },
    RoleRequested {
        user_id: String,
        display_name: String,
        email: String,
    },
}

/// Who receives a message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Audience {
    User(String),
    /// Every administrator except the one who triggered the job
    Administrators { except: Option<String> },
    Nobody,
}

/// Message content before it is fanned out to recipients
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub category: NotificationCategory,
    pub title: String,
    pub body: String,
    pub material_id: Option<Uuid>,
    pub link: Option<String>,
}

fn with_reason(body: String, reason: &Option<String>) -> String {
    match reason.as_deref().map(str::trim).filter(|r| !r.is_empty()) {
        Some(reason) => format!("{} Reason: {}", body, reason),
        None => body,
    }
}

/// Recipients and content for a job
pub fn compose(job: &NotificationJob) -> (Audience, Message) {
    match job {
        NotificationJob::Submitted {
            material_id,
            material_name,
            author_id,
        } => (
            Audience::Administrators {
                except: Some(author_id.clone()),
            },
            Message {
                category: NotificationCategory::Submitted,
                title: "New material submitted".to_string(),
                body: format!("\"{}\" is awaiting review.", material_name),
                material_id: Some(*material_id),
                link: Some(format!("/admin/materials/{}", material_id)),
            },
        ),
        NotificationJob::Edited {
            material_id,
            material_name,
            editor_id,
            editor_is_admin,
            creator_id,
        } => {
            if !editor_is_admin {
                (
                    Audience::Administrators {
                        except: Some(editor_id.clone()),
                    },
                    Message {
                        category: NotificationCategory::Edited,
                        title: "Material edited".to_string(),
                        body: format!("\"{}\" was edited and is awaiting review again.", material_name),
                        material_id: Some(*material_id),
                        link: Some(format!("/admin/materials/{}", material_id)),
                    },
                )
            } else if editor_id != creator_id {
                (
                    Audience::User(creator_id.clone()),
                    Message {
                        category: NotificationCategory::Edited,
                        title: "Material edited by an administrator".to_string(),
                        body: format!("An administrator updated \"{}\".", material_name),
                        material_id: Some(*material_id),
                        link: Some(format!("/materials/{}", material_id)),
                    },
                )
            } else {
                (
                    Audience::Nobody,
                    Message {
                        category: NotificationCategory::Edited,
                        title: String::new(),
                        body: String::new(),
                        material_id: Some(*material_id),
                        link: None,
                    },
                )
            }
        }
        NotificationJob::Approved {
            material_id,
            material_name,
            creator_id,
        } => (
            Audience::User(creator_id.clone()),
            Message {
                category: NotificationCategory::Approved,
                title: "Material approved".to_string(),
                body: format!("\"{}\" is now publicly visible.", material_name),
                material_id: Some(*material_id),
                link: Some(format!("/materials/{}", material_id)),
            },
        ),
        NotificationJob::Rejected {
            material_id,
            material_name,
            creator_id,
            reason,
        } => (
            Audience::User(creator_id.clone()),
            Message {
                category: NotificationCategory::Rejected,
                title: "Material rejected".to_string(),
                body: with_reason(format!("\"{}\" was rejected.", material_name), reason),
                material_id: Some(*material_id),
                link: Some("/my/materials".to_string()),
            },
        ),
        NotificationJob::Removed {
            material_name,
            creator_id,
            reason,
        } => (
            Audience::User(creator_id.clone()),
            Message {
                category: NotificationCategory::Info,
                title: "Material removed".to_string(),
                body: with_reason(
                    format!("\"{}\" was removed by an administrator.", material_name),
                    reason,
                ),
                material_id: None,
                link: None,
            },
        ),
        NotificationJob::RoleRequested {
            user_id,
            display_name,
            email,
        } => (
            Audience::Administrators {
                except: Some(user_id.clone()),
            },
            Message {
                category: NotificationCategory::RoleRequest,
                title: "Collaborator role requested".to_string(),
                body: format!("{} ({}) asked to become a collaborator.", display_name, email),
                material_id: None,
                link: Some("/admin".to_string()),
            },
        ),
    }
}

enum Command {
    Deliver(NotificationJob),
    Flush(oneshot::Sender<()>),
}

/// Handle to the background notification worker
#[derive(Clone)]
pub struct NotificationDispatcher {
    sender: mpsc::Sender<Command>,
}

impl NotificationDispatcher {
    /// Spawn the worker on the current tokio runtime
    pub fn start(db: SqlitePool, queue_capacity: usize) -> Self {
        let (sender, receiver) = mpsc::channel(queue_capacity.max(1));
        tokio::spawn(run_worker(db, receiver));
        Self { sender }
    }

    /// Queue a job without waiting; a full or closed queue drops it
    pub fn dispatch(&self, job: NotificationJob) {
        if let Err(e) = self.sender.try_send(Command::Deliver(job)) {
            let reason = match e {
                mpsc::error::TrySendError::Full(_) => "queue full",
                mpsc::error::TrySendError::Closed(_) => "worker stopped",
            };
            warn!("Notification dropped: {}", reason);
        }
    }

    /// Wait until every job queued before this call has been processed
    pub async fn flush(&self) {
        let (done, wait) = oneshot::channel();
        if self.sender.send(Command::Flush(done)).await.is_ok() {
            let _ = wait.await;
        }
    }
}

async fn run_worker(db: SqlitePool, mut receiver: mpsc::Receiver<Command>) {
    while let Some(command) = receiver.recv().await {
        match command {
            Command::Deliver(job) => {
                if let Err(e) = deliver(&db, &job).await {
                    warn!(error = %e, job = ?job, "Notification delivery failed");
                }
            }
            Command::Flush(done) => {
                let _ = done.send(());
            }
        }
    }
    debug!("Notification worker stopped");
}

async fn deliver(db: &SqlitePool, job: &NotificationJob) -> Result<usize> {
    let (audience, message) = compose(job);
    let mut conn = db.acquire().await?;

    let recipients = match audience {
        Audience::User(id) => vec![id],
        Audience::Administrators { except } => users::administrator_ids(&mut conn)
            .await?
            .into_iter()
            .filter(|id| Some(id) != except.as_ref())
            .collect(),
        Audience::Nobody => Vec::new(),
    };

    for recipient in &recipients {
        let notification = Notification {
            id: Uuid::new_v4(),
            recipient_id: recipient.clone(),
            related_material_id: message.material_id,
            title: message.title.clone(),
            body: message.body.clone(),
            category: message.category,
            link: message.link.clone(),
            read: false,
            created_at: time::now(),
        };
        notifications::insert_notification(&mut conn, &notification).await?;
    }

    debug!(
        category = message.category.as_str(),
        recipients = recipients.len(),
        "Notifications delivered"
    );
    Ok(recipients.len())
}
