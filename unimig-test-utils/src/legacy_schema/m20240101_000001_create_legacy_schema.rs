use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

fn id_column<T: IntoIden>(column: T) -> ColumnDef {
    ColumnDef::new(column)
        .integer()
        .not_null()
        .auto_increment()
        .primary_key()
        .to_owned()
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Org::Table)
                    .if_not_exists()
                    .col(&mut id_column(Org::Id))
                    .col(ColumnDef::new(Org::Name).string().not_null())
                    .col(ColumnDef::new(Org::Created).timestamp().not_null())
                    .to_owned(),
            )
            .await?;

        // Folders live in the dashboard table with is_folder set
        manager
            .create_table(
                Table::create()
                    .table(Dashboard::Table)
                    .if_not_exists()
                    .col(&mut id_column(Dashboard::Id))
                    .col(ColumnDef::new(Dashboard::OrgId).integer().not_null())
                    .col(ColumnDef::new(Dashboard::Uid).string_len(40).not_null())
                    .col(ColumnDef::new(Dashboard::FolderUid).string_len(40))
                    .col(ColumnDef::new(Dashboard::Title).string().not_null())
                    .col(ColumnDef::new(Dashboard::Slug).string().not_null())
                    .col(ColumnDef::new(Dashboard::Data).text().not_null())
                    .col(
                        ColumnDef::new(Dashboard::Version)
                            .integer()
                            .not_null()
                            .default(1),
                    )
                    .col(
                        ColumnDef::new(Dashboard::IsFolder)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(Dashboard::Created).timestamp().not_null())
                    .col(ColumnDef::new(Dashboard::Updated).timestamp().not_null())
                    .col(
                        ColumnDef::new(Dashboard::CreatedBy)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Dashboard::UpdatedBy)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(Dashboard::Deleted).timestamp())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("UQE_dashboard_org_id_uid")
                    .table(Dashboard::Table)
                    .col(Dashboard::OrgId)
                    .col(Dashboard::Uid)
                    .unique()
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(DashboardVersion::Table)
                    .if_not_exists()
                    .col(&mut id_column(DashboardVersion::Id))
                    .col(
                        ColumnDef::new(DashboardVersion::DashboardId)
                            .integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(DashboardVersion::ParentVersion)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(DashboardVersion::Version)
                            .integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(DashboardVersion::Data).text().not_null())
                    .col(
                        ColumnDef::new(DashboardVersion::Created)
                            .timestamp()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(DashboardVersion::CreatedBy)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(DashboardVersion::Message)
                            .text()
                            .not_null()
                            .default(""),
                    )
                    .to_owned(),
            )
            .await?;

        // Only locked during migration, never read
        manager
            .create_table(
                Table::create()
                    .table(DashboardProvisioning::Table)
                    .if_not_exists()
                    .col(&mut id_column(DashboardProvisioning::Id))
                    .col(
                        ColumnDef::new(DashboardProvisioning::DashboardId)
                            .integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(DashboardProvisioning::Name)
                            .string()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(DashboardTag::Table)
                    .if_not_exists()
                    .col(&mut id_column(DashboardTag::Id))
                    .col(ColumnDef::new(DashboardTag::DashboardId).integer().not_null())
                    .col(ColumnDef::new(DashboardTag::Term).string().not_null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(LibraryElement::Table)
                    .if_not_exists()
                    .col(&mut id_column(LibraryElement::Id))
                    .col(ColumnDef::new(LibraryElement::OrgId).integer().not_null())
                    .col(ColumnDef::new(LibraryElement::Uid).string_len(40).not_null())
                    .col(ColumnDef::new(LibraryElement::FolderUid).string_len(40))
                    .col(ColumnDef::new(LibraryElement::Name).string().not_null())
                    .col(ColumnDef::new(LibraryElement::Kind).integer().not_null())
                    .col(ColumnDef::new(LibraryElement::Type).string().not_null())
                    .col(
                        ColumnDef::new(LibraryElement::Description)
                            .text()
                            .not_null()
                            .default(""),
                    )
                    .col(ColumnDef::new(LibraryElement::Model).text().not_null())
                    .col(
                        ColumnDef::new(LibraryElement::Version)
                            .integer()
                            .not_null()
                            .default(1),
                    )
                    .col(
                        ColumnDef::new(LibraryElement::Created)
                            .timestamp()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(LibraryElement::Updated)
                            .timestamp()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(LibraryElement::CreatedBy)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(LibraryElement::UpdatedBy)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(LibraryElementConnection::Table)
                    .if_not_exists()
                    .col(&mut id_column(LibraryElementConnection::Id))
                    .col(
                        ColumnDef::new(LibraryElementConnection::ElementId)
                            .integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(LibraryElementConnection::ConnectionId)
                            .integer()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Playlist::Table)
                    .if_not_exists()
                    .col(&mut id_column(Playlist::Id))
                    .col(ColumnDef::new(Playlist::OrgId).integer().not_null())
                    .col(ColumnDef::new(Playlist::Uid).string_len(80).not_null())
                    .col(ColumnDef::new(Playlist::Name).string().not_null())
                    .col(ColumnDef::new(Playlist::Interval).string().not_null())
                    .col(
                        ColumnDef::new(Playlist::CreatedAt)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Playlist::UpdatedAt)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(PlaylistItem::Table)
                    .if_not_exists()
                    .col(&mut id_column(PlaylistItem::Id))
                    .col(ColumnDef::new(PlaylistItem::PlaylistId).integer().not_null())
                    .col(ColumnDef::new(PlaylistItem::Type).string().not_null())
                    .col(ColumnDef::new(PlaylistItem::Value).text().not_null())
                    .col(
                        ColumnDef::new(PlaylistItem::Title)
                            .text()
                            .not_null()
                            .default(""),
                    )
                    .col(ColumnDef::new(PlaylistItem::Order).integer().not_null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(ShortUrl::Table)
                    .if_not_exists()
                    .col(&mut id_column(ShortUrl::Id))
                    .col(ColumnDef::new(ShortUrl::OrgId).integer().not_null())
                    .col(ColumnDef::new(ShortUrl::Uid).string_len(40).not_null())
                    .col(ColumnDef::new(ShortUrl::Path).text().not_null())
                    .col(
                        ColumnDef::new(ShortUrl::CreatedBy)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(ShortUrl::CreatedAt)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(ShortUrl::LastSeenAt)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ShortUrl::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(PlaylistItem::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Playlist::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(LibraryElementConnection::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(LibraryElement::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(DashboardTag::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(DashboardProvisioning::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(DashboardVersion::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Dashboard::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Org::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
pub enum Org {
    Table,
    Id,
    Name,
    Created,
}

#[derive(Iden)]
pub enum Dashboard {
    Table,
    Id,
    OrgId,
    Uid,
    FolderUid,
    Title,
    Slug,
    Data,
    Version,
    IsFolder,
    Created,
    Updated,
    CreatedBy,
    UpdatedBy,
    Deleted,
}

#[derive(Iden)]
pub enum DashboardVersion {
    Table,
    Id,
    DashboardId,
    ParentVersion,
    Version,
    Data,
    Created,
    CreatedBy,
    Message,
}

#[derive(Iden)]
enum DashboardProvisioning {
    Table,
    Id,
    DashboardId,
    Name,
}

#[derive(Iden)]
enum DashboardTag {
    Table,
    Id,
    DashboardId,
    Term,
}

#[derive(Iden)]
pub enum LibraryElement {
    Table,
    Id,
    OrgId,
    Uid,
    FolderUid,
    Name,
    Kind,
    Type,
    Description,
    Model,
    Version,
    Created,
    Updated,
    CreatedBy,
    UpdatedBy,
}

#[derive(Iden)]
enum LibraryElementConnection {
    Table,
    Id,
    ElementId,
    ConnectionId,
}

#[derive(Iden)]
pub enum Playlist {
    Table,
    Id,
    OrgId,
    Uid,
    Name,
    Interval,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
pub enum PlaylistItem {
    Table,
    Id,
    PlaylistId,
    Type,
    Value,
    Title,
    Order,
}

#[derive(Iden)]
pub enum ShortUrl {
    Table,
    Id,
    OrgId,
    Uid,
    Path,
    CreatedBy,
    CreatedAt,
    LastSeenAt,
}
