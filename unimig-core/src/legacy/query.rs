use crate::legacy::token::ContinueToken;

/// Which rows a page reads. The shapes never combine in one query.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum QueryShape {
    /// Live rows, ascending internal id
    Current,
    /// Every saved version of one identifier
    History,
    /// Soft-deleted rows, ascending internal id
    Trash,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum SortOrder {
    Ascending,
    /// Newest first; the default for history browsing
    #[default]
    Descending,
}

/// Kinds of rows kept in the dashboard table
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DashboardKind {
    Dashboard,
    Folder,
}

/// One page request against the legacy schema.
#[derive(Clone, Debug)]
pub struct PageRequest {
    pub org_id: i64,
    pub shape: QueryShape,
    /// Identifier filter; required for history
    pub uid: Option<String>,
    /// Exact version filter
    pub version: Option<i64>,
    pub folder: Option<String>,
    pub order: SortOrder,
    pub token: Option<ContinueToken>,
    pub limit: Option<u64>,
    pub max_bytes: Option<usize>,
}

impl PageRequest {
    pub fn new(org_id: i64) -> Self {
        Self {
            org_id,
            shape: QueryShape::Current,
            uid: None,
            version: None,
            folder: None,
            order: SortOrder::default(),
            token: None,
            limit: None,
            max_bytes: None,
        }
    }

    pub fn history(org_id: i64, uid: impl Into<String>) -> Self {
        Self {
            shape: QueryShape::History,
            uid: Some(uid.into()),
            ..Self::new(org_id)
        }
    }

    pub fn trash(org_id: i64) -> Self {
        Self {
            shape: QueryShape::Trash,
            ..Self::new(org_id)
        }
    }

    pub fn with_uid(mut self, uid: impl Into<String>) -> Self {
        self.uid = Some(uid.into());
        self
    }

    pub fn with_version(mut self, version: i64) -> Self {
        self.version = Some(version);
        self
    }

    pub fn in_folder(mut self, folder_uid: impl Into<String>) -> Self {
        self.folder = Some(folder_uid.into());
        self
    }

    pub fn ascending(mut self) -> Self {
        self.order = SortOrder::Ascending;
        self
    }

    pub fn with_token(mut self, token: Option<ContinueToken>) -> Self {
        self.token = token;
        self
    }

    pub fn with_limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_max_bytes(mut self, max_bytes: usize) -> Self {
        self.max_bytes = Some(max_bytes);
        self
    }

    /// Cursor to resume after, 0 meaning from the start
    pub fn start_id(&self) -> i64 {
        self.token.as_ref().map(|token| token.start_id).unwrap_or(0)
    }

    /// Folder filter, taken from the token when resuming
    pub fn folder_filter(&self) -> Option<&str> {
        match &self.token {
            Some(token) if !token.folder.is_empty() => Some(token.folder.as_str()),
            _ => self.folder.as_deref(),
        }
    }
}

/// Rows of one page plus the token for the next, `None` once exhausted
#[derive(Clone, Debug)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next: Option<ContinueToken>,
}

impl<T> Page<T> {
    pub fn is_last(&self) -> bool {
        self.next.is_none()
    }
}

impl<T> Default for Page<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            next: None,
        }
    }
}
