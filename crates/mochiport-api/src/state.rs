use std::sync::Arc;

use mochiport_db::Store;
use mochiport_gateway::dispatcher::Dispatcher;

use crate::ai::AiService;
use crate::services::chat::ChatService;
use crate::services::conversations::ConversationService;
use crate::services::drafts::DraftService;
use crate::services::reminders::ReminderService;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub store: Arc<dyn Store>,
    pub ai: Arc<dyn AiService>,
    pub dispatcher: Dispatcher,
    /// `None` disables authentication entirely.
    pub jwt_secret: Option<String>,
    pub conversations: ConversationService,
    pub drafts: DraftService,
    pub reminders: ReminderService,
    pub chat: ChatService,
}

impl AppStateInner {
    pub fn new(
        store: Arc<dyn Store>,
        ai: Arc<dyn AiService>,
        dispatcher: Dispatcher,
        jwt_secret: Option<String>,
        system_prompt: String,
    ) -> AppState {
        let conversations = ConversationService::new(store.clone(), dispatcher.clone());
        let drafts = DraftService::new(store.clone(), dispatcher.clone(), conversations.clone());
        let reminders = ReminderService::new(store.clone(), dispatcher.clone());
        let chat = ChatService::new(conversations.clone(), ai.clone(), system_prompt);

        Arc::new(Self {
            store,
            ai,
            dispatcher,
            jwt_secret,
            conversations,
            drafts,
            reminders,
            chat,
        })
    }
}
