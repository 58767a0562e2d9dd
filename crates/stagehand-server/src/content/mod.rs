//! Document-store collaborator: the trait seam, the bundled JSON adapter
//! and the query facade used by handlers and the HTTP surface.

pub mod queries;
pub mod store;

pub use queries::{BossTemplates, ContentQueries, DanmakuKind};
pub use store::{ContentStore, Document, Filter, JsonDocumentStore, StoreHandle};

pub const WELCOME_DANMAKU: &str = "Welcome_Danmaku";
pub const MOCK_DANMAKU: &str = "Mock_Danmaku";
pub const ANTI_FAN_QUOTES: &str = "Anti_Fan_Quotes";
pub const REVERSAL_COPY: &str = "Reversal_Copy";
pub const SOCIAL_TOPICS: &str = "Social_Topics";
pub const BIG_BROTHERS: &str = "Big_Brothers";
pub const GIFT_THANKS: &str = "Gift_Thanks_Danmaku";

pub const ALL_COLLECTIONS: [&str; 7] = [
    WELCOME_DANMAKU,
    MOCK_DANMAKU,
    ANTI_FAN_QUOTES,
    REVERSAL_COPY,
    SOCIAL_TOPICS,
    BIG_BROTHERS,
    GIFT_THANKS,
];
