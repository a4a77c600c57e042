use sea_orm_migration::prelude::*;

/// Rows to scroll through.
const NUMBERS: i64 = 500;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Numbers::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Numbers::Id)
                            .integer()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Numbers::Square).big_integer().not_null())
                    .col(ColumnDef::new(Numbers::Label).string().not_null())
                    .to_owned(),
            )
            .await?;

        let values = (1..=NUMBERS)
            .map(|i| format!("({i}, {}, 'n{i}')", i * i))
            .collect::<Vec<_>>()
            .join(", ");
        manager
            .get_connection()
            .execute_unprepared(&format!("INSERT INTO numbers (id, square, label) VALUES {values}"))
            .await?;
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Numbers::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum Numbers {
    Table,
    Id,
    Square,
    Label,
}
