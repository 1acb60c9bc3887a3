use std::sync::Arc;

use chrono::{Duration, SubsecRound};
use tracing::{debug, info};
use uuid::Uuid;

use mochiport_db::{ReminderQuery, Store};
use mochiport_gateway::dispatcher::Dispatcher;
use mochiport_types::api::{
    CreateReminderRequest, ListRemindersParams, MAX_LIMIT, PageRequest, Pagination,
    ReminderSortField, SortOrder, UpdateReminderRequest,
};
use mochiport_types::events::RealtimeEvent;
use mochiport_types::models::{Reminder, ReminderStatus, timestamp_now};
use mochiport_types::text::normalize_tags;
use mochiport_types::validation::{self, ValidationError};

use super::run_blocking;
use crate::error::ApiError;

pub const DEFAULT_UPCOMING_HOURS: u32 = 24;
/// Thirty days.
const MAX_UPCOMING_HOURS: u32 = 720;

#[derive(Clone)]
pub struct ReminderService {
    store: Arc<dyn Store>,
    dispatcher: Dispatcher,
}

impl ReminderService {
    pub fn new(store: Arc<dyn Store>, dispatcher: Dispatcher) -> Self {
        Self { store, dispatcher }
    }

    pub async fn get_reminders(
        &self,
        params: ListRemindersParams,
    ) -> Result<(Vec<Reminder>, Pagination), ApiError> {
        // nothing can be due past the ceiling, and stored dates only compare
        // correctly up to it
        let latest = validation::latest_due_date();
        if params.due_after.is_some_and(|after| after > latest) {
            let page_req = PageRequest::new(params.page, params.limit);
            return Ok((Vec::new(), Pagination::new(page_req, 0)));
        }
        let query = ReminderQuery {
            statuses: params.status.into_iter().collect(),
            priority: params.priority,
            reminder_type: params.reminder_type,
            conversation_id: params.conversation_id,
            due_after: params.due_after,
            due_before: params.due_before.map(|before| before.min(latest)),
            overdue_as_of: None,
            search: params.search,
            sort_by: params.sort_by.unwrap_or_default(),
            sort_order: params.sort_order.unwrap_or(SortOrder::Asc),
            page: PageRequest::new(params.page, params.limit),
        };
        let page_req = query.page;
        let page = run_blocking(&self.store, move |s| s.list_reminders(&query)).await?;
        Ok((page.items, Pagination::new(page_req, page.total)))
    }

    pub async fn get_reminder_by_id(&self, id: Uuid) -> Result<Reminder, ApiError> {
        run_blocking(&self.store, move |s| s.get_reminder(id))
            .await?
            .ok_or(ApiError::NotFound("Reminder"))
    }

    pub async fn create_reminder(&self, req: CreateReminderRequest) -> Result<Reminder, ApiError> {
        let conversation_id = req
            .conversation_id
            .ok_or_else(|| ValidationError::new("Conversation id is required"))?;
        let title = validation::required_title(req.title.as_deref())?;
        let description = validation::description(req.description.as_deref())?;
        let due = req
            .due_date
            .ok_or_else(|| ValidationError::new("Due date is required"))?;
        let now = timestamp_now();
        let due_date = validation::future_due_date(due.trunc_subsecs(3), now)?;

        let exists = run_blocking(&self.store, move |s| s.get_conversation(conversation_id))
            .await?
            .is_some();
        if !exists {
            return Err(ApiError::NotFound("Conversation"));
        }

        let mut metadata = req.metadata.unwrap_or_default();
        metadata.tags = normalize_tags(&metadata.tags);
        metadata.snooze_count = 0;
        metadata.last_snoozed_at = None;
        metadata.completed_at = None;

        let reminder = Reminder {
            id: Uuid::new_v4(),
            conversation_id,
            title,
            description,
            due_date,
            status: ReminderStatus::Pending,
            reminder_type: req.reminder_type.unwrap_or_default(),
            priority: req.priority.unwrap_or_default(),
            metadata,
            created_at: now,
            updated_at: now,
        };

        let record = reminder.clone();
        run_blocking(&self.store, move |s| s.insert_reminder(&record)).await?;
        info!("Reminder {} created, due {}", reminder.id, reminder.due_date);
        self.dispatcher.publish(RealtimeEvent::reminder_changed(&reminder));
        Ok(reminder)
    }

    pub async fn update_reminder(&self, id: Uuid, req: UpdateReminderRequest) -> Result<Reminder, ApiError> {
        let title = validation::optional_title(req.title.as_deref())?;
        let now = timestamp_now();
        let due_date = req
            .due_date
            .map(|due| validation::future_due_date(due.trunc_subsecs(3), now))
            .transpose()?;
        let mut reminder = self.get_reminder_by_id(id).await?;

        if let Some(title) = title {
            reminder.title = title;
        }
        if req.description.is_some() {
            reminder.description = validation::description(req.description.as_deref())?;
        }
        if let Some(due_date) = due_date {
            reminder.due_date = due_date;
            // a new future due date reopens an overdue reminder
            if reminder.status == ReminderStatus::Overdue {
                reminder.status = ReminderStatus::Pending;
            }
        }
        if let Some(status) = req.status {
            if status == ReminderStatus::Completed && reminder.status != ReminderStatus::Completed {
                reminder.metadata.completed_at = Some(now);
            }
            reminder.status = status;
        }
        if let Some(reminder_type) = req.reminder_type {
            reminder.reminder_type = reminder_type;
        }
        if let Some(priority) = req.priority {
            reminder.priority = priority;
        }
        if let Some(metadata) = req.metadata {
            reminder.metadata.tags = normalize_tags(&metadata.tags);
        }
        reminder.updated_at = now;

        self.save(reminder).await
    }

    pub async fn delete_reminder(&self, id: Uuid) -> Result<(), ApiError> {
        let reminder = self.get_reminder_by_id(id).await?;
        let deleted = run_blocking(&self.store, move |s| s.delete_reminder(id)).await?;
        if !deleted {
            return Err(ApiError::NotFound("Reminder"));
        }
        self.dispatcher.publish(RealtimeEvent::ReminderDeleted {
            reminder_id: id,
            conversation_id: reminder.conversation_id,
        });
        Ok(())
    }

    /// Push the due date back by `minutes` (default 15).
    pub async fn snooze_reminder(&self, id: Uuid, minutes: Option<i64>) -> Result<Reminder, ApiError> {
        let minutes = validation::snooze_minutes(minutes)?;
        let mut reminder = self.get_reminder_by_id(id).await?;
        if reminder.status == ReminderStatus::Completed {
            return Err(ValidationError::new("Cannot snooze a completed reminder").into());
        }

        let now = timestamp_now();
        reminder.due_date = validation::snoozed_due_date(reminder.due_date, minutes)?;
        reminder.status = ReminderStatus::Snoozed;
        reminder.metadata.snooze_count += 1;
        reminder.metadata.last_snoozed_at = Some(now);
        reminder.updated_at = now;

        debug!("Reminder {} snoozed for {} minutes", id, minutes);
        self.save(reminder).await
    }

    pub async fn mark_as_completed(&self, id: Uuid) -> Result<Reminder, ApiError> {
        let mut reminder = self.get_reminder_by_id(id).await?;
        if reminder.status == ReminderStatus::Completed {
            return Ok(reminder);
        }
        let now = timestamp_now();
        reminder.status = ReminderStatus::Completed;
        reminder.metadata.completed_at = Some(now);
        reminder.updated_at = now;
        self.save(reminder).await
    }

    pub async fn cancel_reminder(&self, id: Uuid) -> Result<Reminder, ApiError> {
        let mut reminder = self.get_reminder_by_id(id).await?;
        match reminder.status {
            ReminderStatus::Completed => {
                return Err(ValidationError::new("Cannot cancel a completed reminder").into());
            }
            ReminderStatus::Cancelled => return Ok(reminder),
            _ => {}
        }
        reminder.status = ReminderStatus::Cancelled;
        reminder.updated_at = timestamp_now();
        self.save(reminder).await
    }

    /// Open reminders due within the next `hours`, soonest first.
    pub async fn get_upcoming_reminders(&self, hours: Option<u32>) -> Result<Vec<Reminder>, ApiError> {
        let hours = hours.unwrap_or(DEFAULT_UPCOMING_HOURS);
        if !(1..=MAX_UPCOMING_HOURS).contains(&hours) {
            return Err(ApiError::Validation(format!(
                "Hours must be between 1 and {MAX_UPCOMING_HOURS}"
            )));
        }
        let now = timestamp_now();
        let query = ReminderQuery {
            statuses: vec![ReminderStatus::Pending, ReminderStatus::Snoozed],
            due_after: Some(now),
            due_before: Some(now + Duration::hours(i64::from(hours))),
            page: PageRequest::new(None, Some(MAX_LIMIT)),
            ..Default::default()
        };
        let page = run_blocking(&self.store, move |s| s.list_reminders(&query)).await?;
        Ok(page.items)
    }

    /// Reminders flagged overdue plus open ones already past due, oldest first.
    pub async fn get_overdue_reminders(&self) -> Result<Vec<Reminder>, ApiError> {
        let query = ReminderQuery {
            overdue_as_of: Some(timestamp_now()),
            sort_by: ReminderSortField::DueDate,
            sort_order: SortOrder::Asc,
            page: PageRequest::new(None, Some(MAX_LIMIT)),
            ..Default::default()
        };
        let page = run_blocking(&self.store, move |s| s.list_reminders(&query)).await?;
        Ok(page.items)
    }

    /// Flag open reminders whose due date has passed. Returns how many changed.
    pub async fn sweep_overdue(&self) -> Result<usize, ApiError> {
        let now = timestamp_now();
        let flipped = run_blocking(&self.store, move |s| s.mark_overdue(now)).await?;
        for reminder in &flipped {
            self.dispatcher.publish(RealtimeEvent::reminder_changed(reminder));
        }
        Ok(flipped.len())
    }

    async fn save(&self, reminder: Reminder) -> Result<Reminder, ApiError> {
        let record = reminder.clone();
        let updated = run_blocking(&self.store, move |s| s.update_reminder(&record)).await?;
        if !updated {
            return Err(ApiError::NotFound("Reminder"));
        }
        self.dispatcher.publish(RealtimeEvent::reminder_changed(&reminder));
        Ok(reminder)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::testing;
    use crate::state::AppState;
    use mochiport_types::api::CreateConversationRequest;
    use mochiport_types::models::Priority;

    async fn setup() -> (AppState, Uuid) {
        let state = testing::state();
        let conversation = state
            .conversations
            .create_conversation(CreateConversationRequest {
                title: Some("Follow ups".into()),
                ..Default::default()
            })
            .await
            .unwrap();
        (state, conversation.id)
    }

    fn create_req(conversation_id: Uuid, title: &str, due_in: Duration) -> CreateReminderRequest {
        CreateReminderRequest {
            conversation_id: Some(conversation_id),
            title: Some(title.to_string()),
            due_date: Some(timestamp_now() + due_in),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn create_validates_due_date_and_conversation() {
        let (state, cid) = setup().await;

        let err = state
            .reminders
            .create_reminder(create_req(cid, "late", Duration::minutes(-1)))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Due date must be in the future");

        let err = state
            .reminders
            .create_reminder(create_req(Uuid::new_v4(), "orphan", Duration::hours(1)))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::NotFound("Conversation")));

        let reminder = state
            .reminders
            .create_reminder(create_req(cid, "call back", Duration::hours(1)))
            .await
            .unwrap();
        assert_eq!(reminder.status, ReminderStatus::Pending);
        assert_eq!(reminder.priority, Priority::Medium);
    }

    #[tokio::test]
    async fn snooze_shifts_due_date_exactly() {
        let (state, cid) = setup().await;
        let reminder = state
            .reminders
            .create_reminder(create_req(cid, "ping", Duration::hours(1)))
            .await
            .unwrap();

        let snoozed = state.reminders.snooze_reminder(reminder.id, Some(30)).await.unwrap();
        assert_eq!(snoozed.due_date, reminder.due_date + Duration::minutes(30));
        assert_eq!(snoozed.status, ReminderStatus::Snoozed);
        assert_eq!(snoozed.metadata.snooze_count, 1);
        assert!(snoozed.metadata.last_snoozed_at.is_some());

        let again = state.reminders.snooze_reminder(reminder.id, None).await.unwrap();
        assert_eq!(again.due_date, snoozed.due_date + Duration::minutes(15));
        assert_eq!(again.metadata.snooze_count, 2);

        assert!(matches!(
            state.reminders.snooze_reminder(reminder.id, Some(0)).await,
            Err(ApiError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn completed_reminders_stay_completed() {
        let (state, cid) = setup().await;
        let reminder = state
            .reminders
            .create_reminder(create_req(cid, "done soon", Duration::hours(2)))
            .await
            .unwrap();

        let done = state.reminders.mark_as_completed(reminder.id).await.unwrap();
        assert_eq!(done.status, ReminderStatus::Completed);
        assert!(done.metadata.completed_at.is_some());

        assert!(matches!(
            state.reminders.snooze_reminder(reminder.id, Some(10)).await,
            Err(ApiError::Validation(_))
        ));
        assert!(matches!(
            state.reminders.cancel_reminder(reminder.id).await,
            Err(ApiError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn cancel_open_reminder() {
        let (state, cid) = setup().await;
        let reminder = state
            .reminders
            .create_reminder(create_req(cid, "maybe", Duration::hours(3)))
            .await
            .unwrap();

        let cancelled = state.reminders.cancel_reminder(reminder.id).await.unwrap();
        assert_eq!(cancelled.status, ReminderStatus::Cancelled);
        assert!(cancelled.updated_at >= reminder.updated_at);

        let again = state.reminders.cancel_reminder(reminder.id).await.unwrap();
        assert_eq!(again, cancelled);
        let stored = state.reminders.get_reminder_by_id(reminder.id).await.unwrap();
        assert_eq!(stored.status, ReminderStatus::Cancelled);
    }

    #[tokio::test]
    async fn update_applies_fields_and_checks_due_date() {
        let (state, cid) = setup().await;
        let reminder = state
            .reminders
            .create_reminder(create_req(cid, "draft agenda", Duration::hours(1)))
            .await
            .unwrap();

        let err = state
            .reminders
            .update_reminder(
                reminder.id,
                UpdateReminderRequest {
                    due_date: Some(timestamp_now() - Duration::minutes(1)),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Due date must be in the future");

        let updated = state
            .reminders
            .update_reminder(
                reminder.id,
                UpdateReminderRequest {
                    title: Some("  final agenda ".into()),
                    priority: Some(Priority::High),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.title, "final agenda");
        assert_eq!(updated.priority, Priority::High);
        assert_eq!(updated.due_date, reminder.due_date);

        assert!(matches!(
            state
                .reminders
                .update_reminder(Uuid::new_v4(), UpdateReminderRequest::default())
                .await,
            Err(ApiError::NotFound("Reminder"))
        ));
    }

    #[tokio::test]
    async fn new_due_date_reopens_overdue() {
        let (state, cid) = setup().await;
        let reminder = state
            .reminders
            .create_reminder(create_req(cid, "slipped", Duration::hours(1)))
            .await
            .unwrap();
        let mut past = reminder.clone();
        past.due_date = timestamp_now() - Duration::minutes(5);
        state.store.update_reminder(&past).unwrap();
        assert_eq!(state.reminders.sweep_overdue().await.unwrap(), 1);

        let due = timestamp_now() + Duration::hours(4);
        let reopened = state
            .reminders
            .update_reminder(
                reminder.id,
                UpdateReminderRequest {
                    due_date: Some(due),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(reopened.status, ReminderStatus::Pending);
        assert_eq!(reopened.due_date, due.trunc_subsecs(3));
    }

    #[tokio::test]
    async fn completing_through_update_stamps_completed_at() {
        let (state, cid) = setup().await;
        let reminder = state
            .reminders
            .create_reminder(create_req(cid, "wrap up", Duration::hours(1)))
            .await
            .unwrap();
        assert!(reminder.metadata.completed_at.is_none());

        let completed = state
            .reminders
            .update_reminder(
                reminder.id,
                UpdateReminderRequest {
                    status: Some(ReminderStatus::Completed),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(completed.status, ReminderStatus::Completed);
        let stamped = completed.metadata.completed_at.unwrap();

        // a second completion keeps the original stamp
        let again = state
            .reminders
            .update_reminder(
                reminder.id,
                UpdateReminderRequest {
                    status: Some(ReminderStatus::Completed),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(again.metadata.completed_at, Some(stamped));
    }

    #[tokio::test]
    async fn due_dates_stay_within_four_digit_years() {
        let (state, cid) = setup().await;
        let late: chrono::DateTime<chrono::Utc> = "9999-12-31T23:00:00Z".parse().unwrap();
        let reminder = state
            .reminders
            .create_reminder(CreateReminderRequest {
                conversation_id: Some(cid),
                title: Some("far future".into()),
                due_date: Some(late),
                ..Default::default()
            })
            .await
            .unwrap();

        assert!(matches!(
            state.reminders.snooze_reminder(reminder.id, Some(10_080)).await,
            Err(ApiError::Validation(_))
        ));
        let snoozed = state.reminders.snooze_reminder(reminder.id, Some(30)).await.unwrap();
        assert_eq!(snoozed.due_date, late + Duration::minutes(30));

        let err = state
            .reminders
            .create_reminder(CreateReminderRequest {
                conversation_id: Some(cid),
                title: Some("too far".into()),
                due_date: Some(validation::latest_due_date() + Duration::milliseconds(1)),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
    }

    #[tokio::test]
    async fn upcoming_window() {
        let (state, cid) = setup().await;
        let soon = state
            .reminders
            .create_reminder(create_req(cid, "soon", Duration::hours(2)))
            .await
            .unwrap();
        state
            .reminders
            .create_reminder(create_req(cid, "later", Duration::hours(48)))
            .await
            .unwrap();
        let sooner = state
            .reminders
            .create_reminder(create_req(cid, "sooner", Duration::minutes(30)))
            .await
            .unwrap();

        let upcoming = state.reminders.get_upcoming_reminders(None).await.unwrap();
        let ids: Vec<_> = upcoming.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![sooner.id, soon.id]);

        assert_eq!(state.reminders.get_upcoming_reminders(Some(72)).await.unwrap().len(), 3);
        assert!(state.reminders.get_upcoming_reminders(Some(0)).await.is_err());
    }

    #[tokio::test]
    async fn sweep_flags_past_due() {
        let (state, cid) = setup().await;
        let reminder = state
            .reminders
            .create_reminder(create_req(cid, "expiring", Duration::hours(1)))
            .await
            .unwrap();

        // backdate through the store, since the service refuses past due dates
        let mut past = reminder.clone();
        past.due_date = timestamp_now() - Duration::minutes(5);
        state.store.update_reminder(&past).unwrap();

        let overdue = state.reminders.get_overdue_reminders().await.unwrap();
        assert_eq!(overdue.len(), 1);
        assert_eq!(overdue[0].status, ReminderStatus::Pending);

        assert_eq!(state.reminders.sweep_overdue().await.unwrap(), 1);
        assert_eq!(state.reminders.sweep_overdue().await.unwrap(), 0);

        let flagged = state.reminders.get_reminder_by_id(reminder.id).await.unwrap();
        assert_eq!(flagged.status, ReminderStatus::Overdue);
        assert_eq!(state.reminders.get_overdue_reminders().await.unwrap().len(), 1);
    }
}
