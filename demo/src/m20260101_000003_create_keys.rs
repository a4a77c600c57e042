use sea_orm_migration::prelude::*;

/// Relations with unusual keys: a composite primary key, and a table whose
/// only unique index is on a nullable column.
#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Pairs::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Pairs::A).integer().not_null())
                    .col(ColumnDef::new(Pairs::B).integer().not_null())
                    .col(ColumnDef::new(Pairs::Label).string().null())
                    .primary_key(Index::create().col(Pairs::A).col(Pairs::B))
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Tags::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Tags::Label).string().null())
                    .col(ColumnDef::new(Tags::Slug).string().null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .unique()
                    .name("uq_tags_slug")
                    .table(Tags::Table)
                    .col(Tags::Slug)
                    .to_owned(),
            )
            .await?;

        let db = manager.get_connection();
        db.execute_unprepared(
            "INSERT INTO pairs (a, b, label) VALUES (2, 1, 'z'), (1, 3, 'y'), (1, 2, 'x')",
        )
        .await?;
        db.execute_unprepared("INSERT INTO tags (label, slug) VALUES ('Rust', 'rust'), ('Untagged', NULL)")
            .await?;
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Tags::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Pairs::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum Pairs {
    Table,
    A,
    B,
    Label,
}

#[derive(Iden)]
enum Tags {
    Table,
    Label,
    Slug,
}
