//! Seed helpers that write rows straight into the legacy tables.

use chrono::Utc;
use sea_orm::sea_query::{Expr, InsertStatement, Query};
use sea_orm::{ConnectionTrait, DatabaseConnection, DbErr};
use serde_json::{json, Value};

use crate::legacy_schema::{
    Dashboard, DashboardVersion, LibraryElement, Org, Playlist, PlaylistItem, ShortUrl,
};

async fn insert(db: &DatabaseConnection, stmt: &InsertStatement) -> Result<i64, DbErr> {
    let backend = db.get_database_backend();
    let result = db.execute(backend.build(stmt)).await?;
    Ok(result.last_insert_id() as i64)
}

pub async fn seed_org(db: &DatabaseConnection, id: i64, name: &str) -> Result<i64, DbErr> {
    insert(
        db,
        Query::insert()
            .into_table(Org::Table)
            .columns([Org::Id, Org::Name, Org::Created])
            .values_panic([
                id.into(),
                name.into(),
                Expr::value(Utc::now().naive_utc()),
            ]),
    )
    .await
}

#[derive(Debug, Clone)]
pub struct DashboardFixture {
    pub uid: String,
    pub title: String,
    pub folder_uid: Option<String>,
    pub data: Value,
    pub version: i64,
    pub is_folder: bool,
    pub deleted: bool,
}

impl DashboardFixture {
    pub fn dashboard(uid: &str, title: &str) -> Self {
        Self {
            uid: uid.to_string(),
            title: title.to_string(),
            folder_uid: None,
            data: json!({ "title": title, "uid": uid, "schemaVersion": 39, "panels": [] }),
            version: 1,
            is_folder: false,
            deleted: false,
        }
    }

    pub fn folder(uid: &str, title: &str) -> Self {
        Self {
            uid: uid.to_string(),
            title: title.to_string(),
            folder_uid: None,
            data: json!({ "title": title, "uid": uid }),
            version: 1,
            is_folder: true,
            deleted: false,
        }
    }

    pub fn in_folder(mut self, folder_uid: &str) -> Self {
        self.folder_uid = Some(folder_uid.to_string());
        self
    }

    pub fn with_version(mut self, version: i64) -> Self {
        self.version = version;
        self
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = data;
        self
    }

    pub fn deleted(mut self) -> Self {
        self.deleted = true;
        self
    }
}

pub async fn insert_dashboard(
    db: &DatabaseConnection,
    org_id: i64,
    fixture: &DashboardFixture,
) -> Result<i64, DbErr> {
    let now = Utc::now().naive_utc();
    insert_dashboard_raw(db, org_id, fixture, fixture.data.to_string(), now).await
}

/// Inserts a dashboard whose `data` column is stored verbatim, which lets
/// tests plant payloads that do not decode.
pub async fn insert_dashboard_raw(
    db: &DatabaseConnection,
    org_id: i64,
    fixture: &DashboardFixture,
    data: String,
    now: chrono::NaiveDateTime,
) -> Result<i64, DbErr> {
    let deleted: Option<chrono::NaiveDateTime> = fixture.deleted.then_some(now);
    insert(
        db,
        Query::insert()
            .into_table(Dashboard::Table)
            .columns([
                Dashboard::OrgId,
                Dashboard::Uid,
                Dashboard::FolderUid,
                Dashboard::Title,
                Dashboard::Slug,
                Dashboard::Data,
                Dashboard::Version,
                Dashboard::IsFolder,
                Dashboard::Created,
                Dashboard::Updated,
                Dashboard::CreatedBy,
                Dashboard::UpdatedBy,
                Dashboard::Deleted,
            ])
            .values_panic([
                org_id.into(),
                fixture.uid.clone().into(),
                fixture.folder_uid.clone().into(),
                fixture.title.clone().into(),
                fixture.title.to_lowercase().replace(' ', "-").into(),
                data.into(),
                fixture.version.into(),
                fixture.is_folder.into(),
                Expr::value(now),
                Expr::value(now),
                1i64.into(),
                1i64.into(),
                Expr::value(deleted),
            ]),
    )
    .await
}

pub async fn insert_dashboard_version(
    db: &DatabaseConnection,
    dashboard_id: i64,
    version: i64,
    data: &Value,
) -> Result<i64, DbErr> {
    insert(
        db,
        Query::insert()
            .into_table(DashboardVersion::Table)
            .columns([
                DashboardVersion::DashboardId,
                DashboardVersion::ParentVersion,
                DashboardVersion::Version,
                DashboardVersion::Data,
                DashboardVersion::Created,
                DashboardVersion::CreatedBy,
                DashboardVersion::Message,
            ])
            .values_panic([
                dashboard_id.into(),
                (version - 1).max(0).into(),
                version.into(),
                data.to_string().into(),
                Expr::value(Utc::now().naive_utc()),
                1i64.into(),
                format!("version {}", version).into(),
            ]),
    )
    .await
}

pub async fn insert_library_panel(
    db: &DatabaseConnection,
    org_id: i64,
    uid: &str,
    name: &str,
    folder_uid: Option<&str>,
) -> Result<i64, DbErr> {
    let now = Utc::now().naive_utc();
    let model = json!({ "type": "timeseries", "title": name, "libraryPanel": { "uid": uid } });
    insert(
        db,
        Query::insert()
            .into_table(LibraryElement::Table)
            .columns([
                LibraryElement::OrgId,
                LibraryElement::Uid,
                LibraryElement::FolderUid,
                LibraryElement::Name,
                LibraryElement::Kind,
                LibraryElement::Type,
                LibraryElement::Description,
                LibraryElement::Model,
                LibraryElement::Version,
                LibraryElement::Created,
                LibraryElement::Updated,
                LibraryElement::CreatedBy,
                LibraryElement::UpdatedBy,
            ])
            .values_panic([
                org_id.into(),
                uid.into(),
                folder_uid.map(str::to_string).into(),
                name.into(),
                1i64.into(),
                "timeseries".into(),
                "".into(),
                model.to_string().into(),
                1i64.into(),
                Expr::value(now),
                Expr::value(now),
                1i64.into(),
                1i64.into(),
            ]),
    )
    .await
}

#[derive(Debug, Clone)]
pub struct PlaylistFixture {
    pub uid: String,
    pub name: String,
    pub interval: String,
    pub items: Vec<(String, String)>,
}

impl PlaylistFixture {
    pub fn new(uid: &str, name: &str) -> Self {
        Self {
            uid: uid.to_string(),
            name: name.to_string(),
            interval: "5m".to_string(),
            items: Vec::new(),
        }
    }

    pub fn item(mut self, kind: &str, value: &str) -> Self {
        self.items.push((kind.to_string(), value.to_string()));
        self
    }
}

pub async fn insert_playlist(
    db: &DatabaseConnection,
    org_id: i64,
    fixture: &PlaylistFixture,
) -> Result<i64, DbErr> {
    let now = Utc::now().timestamp_millis();
    let playlist_id = insert(
        db,
        Query::insert()
            .into_table(Playlist::Table)
            .columns([
                Playlist::OrgId,
                Playlist::Uid,
                Playlist::Name,
                Playlist::Interval,
                Playlist::CreatedAt,
                Playlist::UpdatedAt,
            ])
            .values_panic([
                org_id.into(),
                fixture.uid.clone().into(),
                fixture.name.clone().into(),
                fixture.interval.clone().into(),
                now.into(),
                now.into(),
            ]),
    )
    .await?;

    for (order, (kind, value)) in fixture.items.iter().enumerate() {
        insert(
            db,
            Query::insert()
                .into_table(PlaylistItem::Table)
                .columns([
                    PlaylistItem::PlaylistId,
                    PlaylistItem::Type,
                    PlaylistItem::Value,
                    PlaylistItem::Title,
                    PlaylistItem::Order,
                ])
                .values_panic([
                    playlist_id.into(),
                    kind.clone().into(),
                    value.clone().into(),
                    "".into(),
                    (order as i64 + 1).into(),
                ]),
        )
        .await?;
    }

    Ok(playlist_id)
}

/// The four playlist shapes the migration must carry over: uid items, tag
/// items, a mix of both and an empty playlist.
pub fn standard_playlists() -> Vec<PlaylistFixture> {
    vec![
        PlaylistFixture::new("pl-uids", "By UID")
            .item("dashboard_by_uid", "dash-a")
            .item("dashboard_by_uid", "dash-b"),
        PlaylistFixture::new("pl-tags", "By Tag").item("dashboard_by_tag", "ops"),
        PlaylistFixture::new("pl-mixed", "Mixed")
            .item("dashboard_by_uid", "dash-a")
            .item("dashboard_by_tag", "prod"),
        PlaylistFixture::new("pl-empty", "Empty"),
    ]
}

pub async fn seed_standard_playlists(db: &DatabaseConnection, org_id: i64) -> Result<(), DbErr> {
    for fixture in standard_playlists() {
        insert_playlist(db, org_id, &fixture).await?;
    }
    Ok(())
}

pub async fn insert_short_url(
    db: &DatabaseConnection,
    org_id: i64,
    uid: &str,
    path: &str,
) -> Result<i64, DbErr> {
    let now = Utc::now().timestamp();
    insert(
        db,
        Query::insert()
            .into_table(ShortUrl::Table)
            .columns([
                ShortUrl::OrgId,
                ShortUrl::Uid,
                ShortUrl::Path,
                ShortUrl::CreatedBy,
                ShortUrl::CreatedAt,
                ShortUrl::LastSeenAt,
            ])
            .values_panic([
                org_id.into(),
                uid.into(),
                path.into(),
                1i64.into(),
                now.into(),
                now.into(),
            ]),
    )
    .await
}
