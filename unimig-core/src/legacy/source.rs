use std::collections::HashMap;

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect,
};
use tracing::{debug, info};

use crate::config::{DEFAULT_MAX_PAGE_BYTES, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};
use crate::database::entities::{
    dashboard_versions, dashboards, library_elements, orgs, playlist_items, playlists, short_urls,
};
use crate::errors::{LegacyError, LegacyResult};
use crate::legacy::query::{DashboardKind, Page, PageRequest, QueryShape, SortOrder};
use crate::legacy::rows::{
    DashboardRow, LibraryPanelRow, PlaylistItemRow, PlaylistRow, ShortUrlRow,
};
use crate::legacy::token::ContinueToken;
use crate::legacy::version;
use crate::registry::GroupResource;
use crate::resources::{DASHBOARDS, FOLDERS, LIBRARY_PANELS, PLAYLISTS, SHORT_URLS};

fn utc(value: NaiveDateTime) -> DateTime<Utc> {
    Utc.from_utc_datetime(&value)
}

fn decode_json(table: &'static str, uid: &str, raw: &str) -> LegacyResult<serde_json::Value> {
    serde_json::from_str(raw).map_err(|source| LegacyError::Decode {
        table,
        uid: uid.to_string(),
        source,
    })
}

/// Turns up to `limit + 1` fetched rows into a page.
///
/// A page ends early once it holds at least one row and either budget is
/// spent; a token is only issued when rows remain beyond the page.
fn fill_page<M, T>(
    rows: Vec<M>,
    limit: u64,
    max_bytes: usize,
    mut convert: impl FnMut(M) -> LegacyResult<(T, i64, usize)>,
    token: impl Fn(i64) -> ContinueToken,
) -> LegacyResult<Page<T>> {
    let mut page = Page::default();
    let mut bytes = 0usize;
    let mut rows = rows.into_iter().peekable();

    while let Some(row) = rows.next() {
        let (item, cursor, size) = convert(row)?;
        bytes = bytes.saturating_add(size);
        page.items.push(item);

        let budget_spent = page.items.len() as u64 >= limit || bytes >= max_bytes;
        if budget_spent && rows.peek().is_some() {
            page.next = Some(token(cursor));
            break;
        }
    }

    Ok(page)
}

/// Paged reader over the legacy relational schema.
///
/// Reads run as the migration principal: per-row access checks that apply to
/// normal API reads are not evaluated here.
#[derive(Clone)]
pub struct LegacyRowSource {
    db: DatabaseConnection,
    page_size: u64,
    max_page_bytes: usize,
}

impl LegacyRowSource {
    pub fn new(db: DatabaseConnection) -> Self {
        info!("legacy row source reading as migration principal, access checks bypassed");
        Self {
            db,
            page_size: DEFAULT_PAGE_SIZE,
            max_page_bytes: DEFAULT_MAX_PAGE_BYTES,
        }
    }

    pub fn with_page_limits(mut self, page_size: u64, max_page_bytes: usize) -> Self {
        self.page_size = page_size.clamp(1, MAX_PAGE_SIZE);
        self.max_page_bytes = max_page_bytes.max(1);
        self
    }

    pub fn connection(&self) -> &DatabaseConnection {
        &self.db
    }

    fn budget(&self, request: &PageRequest) -> (u64, usize) {
        (
            request.limit.unwrap_or(self.page_size).clamp(1, MAX_PAGE_SIZE),
            request.max_bytes.unwrap_or(self.max_page_bytes).max(1),
        )
    }

    fn check_token(request: &PageRequest) -> LegacyResult<()> {
        match &request.token {
            Some(token) => token.check_org(request.org_id),
            None => Ok(()),
        }
    }

    pub async fn orgs(&self) -> LegacyResult<Vec<orgs::Model>> {
        Ok(orgs::Entity::find()
            .order_by_asc(orgs::Column::Id)
            .all(&self.db)
            .await?)
    }

    /// Live legacy rows for one resource in one organization
    pub async fn count(&self, group_resource: &GroupResource, org_id: i64) -> LegacyResult<i64> {
        let count = if *group_resource == DASHBOARDS || *group_resource == FOLDERS {
            dashboards::Entity::find()
                .filter(dashboards::Column::OrgId.eq(org_id))
                .filter(dashboards::Column::IsFolder.eq(*group_resource == FOLDERS))
                .filter(dashboards::Column::Deleted.is_null())
                .count(&self.db)
                .await?
        } else if *group_resource == LIBRARY_PANELS {
            library_elements::Entity::find()
                .filter(library_elements::Column::OrgId.eq(org_id))
                .filter(library_elements::Column::Kind.eq(library_elements::KIND_PANEL))
                .count(&self.db)
                .await?
        } else if *group_resource == PLAYLISTS {
            playlists::Entity::find()
                .filter(playlists::Column::OrgId.eq(org_id))
                .count(&self.db)
                .await?
        } else if *group_resource == SHORT_URLS {
            short_urls::Entity::find()
                .filter(short_urls::Column::OrgId.eq(org_id))
                .count(&self.db)
                .await?
        } else {
            return Err(LegacyError::UnknownResource(group_resource.to_string()));
        };

        Ok(count as i64)
    }

    pub async fn dashboards_page(
        &self,
        kind: DashboardKind,
        request: &PageRequest,
    ) -> LegacyResult<Page<DashboardRow>> {
        Self::check_token(request)?;
        if request.shape == QueryShape::History {
            return self.history_page(request).await;
        }

        let (limit, max_bytes) = self.budget(request);
        let folder = request.folder_filter().map(str::to_string);

        let mut query = dashboards::Entity::find()
            .filter(dashboards::Column::OrgId.eq(request.org_id))
            .filter(dashboards::Column::IsFolder.eq(kind == DashboardKind::Folder))
            .filter(dashboards::Column::Id.gt(request.start_id()));
        query = match request.shape {
            QueryShape::Trash => query.filter(dashboards::Column::Deleted.is_not_null()),
            _ => query.filter(dashboards::Column::Deleted.is_null()),
        };
        if let Some(uid) = &request.uid {
            query = query.filter(dashboards::Column::Uid.eq(uid.as_str()));
        }
        if let Some(version) = request.version {
            query = query.filter(dashboards::Column::Version.eq(version));
        }
        if let Some(folder) = &folder {
            query = query.filter(dashboards::Column::FolderUid.eq(folder.as_str()));
        }

        let rows = query
            .order_by_asc(dashboards::Column::Id)
            .limit(limit.saturating_add(1))
            .all(&self.db)
            .await?;
        debug!(
            "read {} {:?} rows ({:?}) for org {} after id {}",
            rows.len(),
            kind,
            request.shape,
            request.org_id,
            request.start_id()
        );

        fill_page(
            rows,
            limit,
            max_bytes,
            |model| {
                let size = model.data.len();
                let data = decode_json("dashboard", &model.uid, &model.data)?;
                let id = model.id;
                let row = DashboardRow {
                    resource_version: version::encode(model.id, model.version)?,
                    internal_id: model.id,
                    org_id: model.org_id,
                    uid: model.uid,
                    folder_uid: model.folder_uid,
                    title: model.title,
                    is_folder: model.is_folder,
                    version: model.version,
                    created: utc(model.created),
                    updated: utc(model.updated),
                    created_by: model.created_by,
                    updated_by: model.updated_by,
                    deleted: model.deleted.map(utc),
                    message: None,
                    data,
                };
                Ok((row, id, size))
            },
            |cursor| ContinueToken::new(request.org_id, cursor, folder.clone().unwrap_or_default()),
        )
    }

    /// Saved versions of one dashboard, paged by version number
    async fn history_page(&self, request: &PageRequest) -> LegacyResult<Page<DashboardRow>> {
        let uid = request.uid.as_deref().ok_or_else(|| {
            LegacyError::InvalidQuery("history reads require a dashboard uid".to_string())
        })?;
        let (limit, max_bytes) = self.budget(request);
        let start = request.start_id();

        let mut query = dashboard_versions::Entity::find()
            .find_also_related(dashboards::Entity)
            .filter(dashboards::Column::OrgId.eq(request.org_id))
            .filter(dashboards::Column::Uid.eq(uid));
        if let Some(version) = request.version {
            query = query.filter(dashboard_versions::Column::Version.eq(version));
        }
        query = match request.order {
            SortOrder::Ascending => query
                .filter(dashboard_versions::Column::Version.gt(start))
                .order_by_asc(dashboard_versions::Column::Version),
            SortOrder::Descending if start > 0 => query
                .filter(dashboard_versions::Column::Version.lt(start))
                .order_by_desc(dashboard_versions::Column::Version),
            SortOrder::Descending => query.order_by_desc(dashboard_versions::Column::Version),
        };

        let rows: Vec<(dashboard_versions::Model, dashboards::Model)> = query
            .limit(limit.saturating_add(1))
            .all(&self.db)
            .await?
            .into_iter()
            .filter_map(|(saved, dashboard)| dashboard.map(|dashboard| (saved, dashboard)))
            .collect();
        debug!(
            "read {} history rows for dashboard {} in org {}",
            rows.len(),
            uid,
            request.org_id
        );

        fill_page(
            rows,
            limit,
            max_bytes,
            |(saved, dashboard)| {
                let size = saved.data.len();
                let data = decode_json("dashboard_version", &dashboard.uid, &saved.data)?;
                let row = DashboardRow {
                    resource_version: version::encode(dashboard.id, saved.version)?,
                    internal_id: dashboard.id,
                    org_id: dashboard.org_id,
                    uid: dashboard.uid,
                    folder_uid: dashboard.folder_uid,
                    title: dashboard.title,
                    is_folder: dashboard.is_folder,
                    version: saved.version,
                    created: utc(dashboard.created),
                    updated: utc(saved.created),
                    created_by: dashboard.created_by,
                    updated_by: saved.created_by,
                    deleted: None,
                    message: Some(saved.message).filter(|message| !message.is_empty()),
                    data,
                };
                Ok((row, saved.version, size))
            },
            |cursor| ContinueToken::new(request.org_id, cursor, ""),
        )
    }

    pub async fn library_panels_page(
        &self,
        request: &PageRequest,
    ) -> LegacyResult<Page<LibraryPanelRow>> {
        Self::check_token(request)?;
        if request.shape != QueryShape::Current {
            return Err(LegacyError::InvalidQuery(
                "library panels only support current rows".to_string(),
            ));
        }

        let (limit, max_bytes) = self.budget(request);
        let folder = request.folder_filter().map(str::to_string);

        let mut query = library_elements::Entity::find()
            .filter(library_elements::Column::OrgId.eq(request.org_id))
            .filter(library_elements::Column::Kind.eq(library_elements::KIND_PANEL))
            .filter(library_elements::Column::Id.gt(request.start_id()));
        if let Some(uid) = &request.uid {
            query = query.filter(library_elements::Column::Uid.eq(uid.as_str()));
        }
        if let Some(folder) = &folder {
            query = query.filter(library_elements::Column::FolderUid.eq(folder.as_str()));
        }

        let rows = query
            .order_by_asc(library_elements::Column::Id)
            .limit(limit.saturating_add(1))
            .all(&self.db)
            .await?;

        fill_page(
            rows,
            limit,
            max_bytes,
            |model| {
                let size = model.model.len();
                let panel = decode_json("library_element", &model.uid, &model.model)?;
                let id = model.id;
                let row = LibraryPanelRow {
                    resource_version: version::encode(model.id, model.version)?,
                    internal_id: model.id,
                    org_id: model.org_id,
                    uid: model.uid,
                    folder_uid: model.folder_uid,
                    name: model.name,
                    panel_type: model.panel_type,
                    description: model.description,
                    model: panel,
                    version: model.version,
                    created: utc(model.created),
                    updated: utc(model.updated),
                    created_by: model.created_by,
                    updated_by: model.updated_by,
                };
                Ok((row, id, size))
            },
            |cursor| ContinueToken::new(request.org_id, cursor, folder.clone().unwrap_or_default()),
        )
    }

    pub async fn playlists_page(&self, request: &PageRequest) -> LegacyResult<Page<PlaylistRow>> {
        Self::check_token(request)?;
        if request.shape != QueryShape::Current {
            return Err(LegacyError::InvalidQuery(
                "playlists only support current rows".to_string(),
            ));
        }

        let (limit, max_bytes) = self.budget(request);
        let mut query = playlists::Entity::find()
            .filter(playlists::Column::OrgId.eq(request.org_id))
            .filter(playlists::Column::Id.gt(request.start_id()));
        if let Some(uid) = &request.uid {
            query = query.filter(playlists::Column::Uid.eq(uid.as_str()));
        }
        let rows = query
            .order_by_asc(playlists::Column::Id)
            .limit(limit.saturating_add(1))
            .all(&self.db)
            .await?;

        let ids: Vec<i64> = rows.iter().map(|row| row.id).collect();
        let mut items: HashMap<i64, Vec<PlaylistItemRow>> = HashMap::new();
        if !ids.is_empty() {
            let loaded = playlist_items::Entity::find()
                .filter(playlist_items::Column::PlaylistId.is_in(ids))
                .order_by_asc(playlist_items::Column::PlaylistId)
                .order_by_asc(playlist_items::Column::Order)
                .all(&self.db)
                .await?;
            for item in loaded {
                items.entry(item.playlist_id).or_default().push(PlaylistItemRow {
                    item_type: item.item_type,
                    value: item.value,
                    title: item.title,
                });
            }
        }

        fill_page(
            rows,
            limit,
            max_bytes,
            |model| {
                let items = items.remove(&model.id).unwrap_or_default();
                let size = model.name.len()
                    + items
                        .iter()
                        .map(|item| item.value.len() + item.title.len())
                        .sum::<usize>();
                let id = model.id;
                let row = PlaylistRow {
                    internal_id: model.id,
                    org_id: model.org_id,
                    uid: model.uid,
                    name: model.name,
                    interval: model.interval,
                    items,
                    created_at: model.created_at,
                    updated_at: model.updated_at,
                };
                Ok((row, id, size))
            },
            |cursor| ContinueToken::new(request.org_id, cursor, ""),
        )
    }

    pub async fn short_urls_page(&self, request: &PageRequest) -> LegacyResult<Page<ShortUrlRow>> {
        Self::check_token(request)?;
        if request.shape != QueryShape::Current {
            return Err(LegacyError::InvalidQuery(
                "short urls only support current rows".to_string(),
            ));
        }

        let (limit, max_bytes) = self.budget(request);
        let mut query = short_urls::Entity::find()
            .filter(short_urls::Column::OrgId.eq(request.org_id))
            .filter(short_urls::Column::Id.gt(request.start_id()));
        if let Some(uid) = &request.uid {
            query = query.filter(short_urls::Column::Uid.eq(uid.as_str()));
        }
        let rows = query
            .order_by_asc(short_urls::Column::Id)
            .limit(limit.saturating_add(1))
            .all(&self.db)
            .await?;

        fill_page(
            rows,
            limit,
            max_bytes,
            |model| {
                let size = model.path.len();
                let id = model.id;
                let row = ShortUrlRow {
                    internal_id: model.id,
                    org_id: model.org_id,
                    uid: model.uid,
                    path: model.path,
                    created_by: model.created_by,
                    created_at: model.created_at,
                    last_seen_at: model.last_seen_at,
                };
                Ok((row, id, size))
            },
            |cursor| ContinueToken::new(request.org_id, cursor, ""),
        )
    }
}
