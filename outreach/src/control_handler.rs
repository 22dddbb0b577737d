//! Bridges control-socket requests to the dispatch engine

use std::{sync::Arc, time::Instant};

use async_trait::async_trait;
use outreach_common::incoming;
use outreach_control::{
    CommandHandler, JobCommand, Request, RequestCommand, Response, RosterCommand, SystemCommand,
    protocol::{JobStatusInfo, RecipientFilters, RecipientRow, ResponseData, SystemStatus},
};
use outreach_dispatch::{DispatchSnapshot, Dispatcher, Recipient, RecipientQuery};

/// Serves control requests against the daemon's single dispatcher.
///
/// Domain failures (invalid state transitions, upstream fetch errors)
/// become error responses rather than transport errors, so the client
/// always gets a decodable reply.
pub struct OutreachControlHandler {
    dispatcher: Arc<Dispatcher>,
    started_at: Instant,
}

impl OutreachControlHandler {
    #[must_use]
    pub fn new(dispatcher: Arc<Dispatcher>) -> Self {
        Self {
            dispatcher,
            started_at: Instant::now(),
        }
    }

    async fn handle_job(&self, command: JobCommand) -> Response {
        match command {
            JobCommand::Start {
                template_id,
                locale,
            } => match self.dispatcher.start(&template_id, locale.as_deref()).await {
                Ok(()) => Response::data(ResponseData::Message(format!(
                    "run started with template '{template_id}'"
                ))),
                Err(e) => Response::error(e.to_string()),
            },
            JobCommand::Pause => {
                self.dispatcher.pause();
                Response::ok()
            }
            JobCommand::Resume => {
                self.dispatcher.resume();
                Response::ok()
            }
            JobCommand::Stop => {
                self.dispatcher.stop().await;
                Response::ok()
            }
            JobCommand::Status => {
                Response::data(ResponseData::JobStatus(status_info(
                    &self.dispatcher.snapshot(),
                )))
            }
        }
    }

    async fn handle_roster(&self, command: RosterCommand) -> Response {
        match command {
            RosterCommand::Fetch { filters } => {
                let query = to_query(filters);
                match self.dispatcher.fetch_recipients(&query).await {
                    Ok(count) => Response::data(ResponseData::Message(format!(
                        "fetched {count} recipient(s)"
                    ))),
                    Err(e) => Response::error(e.to_string()),
                }
            }
            RosterCommand::Select { ids } => {
                let changed = self.dispatcher.set_selected(&ids, true);
                Response::data(ResponseData::Message(format!(
                    "selected {changed} of {} recipient(s)",
                    ids.len()
                )))
            }
            RosterCommand::Deselect { ids } => {
                let changed = self.dispatcher.set_selected(&ids, false);
                Response::data(ResponseData::Message(format!(
                    "deselected {changed} of {} recipient(s)",
                    ids.len()
                )))
            }
            RosterCommand::List { status_filter } => {
                let rows = self
                    .dispatcher
                    .recipients()
                    .into_iter()
                    .filter(|recipient| {
                        status_filter
                            .as_ref()
                            .is_none_or(|status| recipient.status.to_string() == *status)
                    })
                    .map(to_row)
                    .collect();

                Response::data(ResponseData::RecipientList(rows))
            }
        }
    }

    fn handle_system(&self, command: SystemCommand) -> Response {
        match command {
            SystemCommand::Ping => Response::ok(),
            SystemCommand::Status => {
                let roster = self.dispatcher.recipients();
                let selected_count = roster.iter().filter(|r| r.selected).count();

                Response::data(ResponseData::SystemStatus(SystemStatus {
                    version: env!("CARGO_PKG_VERSION").to_string(),
                    uptime_secs: self.started_at.elapsed().as_secs(),
                    job_state: self.dispatcher.state().to_string(),
                    roster_size: roster.len(),
                    selected_count,
                }))
            }
        }
    }
}

#[async_trait]
impl CommandHandler for OutreachControlHandler {
    async fn handle_request(&self, request: Request) -> outreach_control::Result<Response> {
        incoming!(level = DEBUG, "Control request: {:?}", request.command);

        let response = match request.command {
            RequestCommand::Job(command) => self.handle_job(command).await,
            RequestCommand::Roster(command) => self.handle_roster(command).await,
            RequestCommand::System(command) => self.handle_system(command),
        };

        Ok(response)
    }
}

fn status_info(snapshot: &DispatchSnapshot) -> JobStatusInfo {
    JobStatusInfo {
        run_id: snapshot.run_id.clone(),
        state: snapshot.state.to_string(),
        current_index: snapshot.current_index,
        total: snapshot.total,
        selected_count: snapshot.selected_count,
        sent_count: snapshot.sent_count,
        failed_count: snapshot.failed_count,
        pending_count: snapshot.pending_count,
        started_at: snapshot.started_at,
    }
}

fn to_query(filters: RecipientFilters) -> RecipientQuery {
    RecipientQuery {
        date_from: filters.date_from,
        date_to: filters.date_to,
        doctor_id: filters.doctor_id,
        service_id: filters.service_id,
        specialist_id: filters.specialist_id,
        unique_phones_only: filters.unique_phones_only,
    }
}

fn to_row(recipient: Recipient) -> RecipientRow {
    RecipientRow {
        id: recipient.id,
        name: recipient.name,
        phone: recipient.phone,
        selected: recipient.selected,
        status: recipient.status.to_string(),
        error: recipient.error,
        provider_message_id: recipient.provider_message_id,
    }
}
