use sea_query::Iden;

/// Metadata table - key-value store for store configuration
#[derive(Iden)]
pub enum Metadata {
    Table,
    Key,
    Value,
}

/// Sessions table - one row per recorded gait clip
#[derive(Iden)]
pub enum Sessions {
    Table,
    Id,
    PatientId,
    Assessment,
    StartTime,
    EndTime,
    DurationMs,
    StartTimeMs,
    Filename,
    Filepath,
    Size,
    CreatedAt,
}
