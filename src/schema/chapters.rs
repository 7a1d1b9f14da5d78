use super::*;

pub static CHAPTERS: EntitySchema = EntitySchema {
    kind: EntityKind::Chapters,
    collection: "/api/chapters",
    title: "Chapters",
    singular: "chapter",
    fields: &[
        FieldDef {
            name: "name",
            label: "name",
            kind: FieldKind::Text,
            nullable: false,
        },
        FieldDef {
            name: "marinesCount",
            label: "marines count",
            kind: FieldKind::Integer { min: 1, max: 1000 },
            nullable: false,
        },
    ],
    columns: &[
        ColumnDef {
            title: "id",
            field: "id",
            sort_key: Some("id"),
            client_key: None,
            width: 6,
        },
        ColumnDef {
            title: "name",
            field: "name",
            sort_key: Some("name"),
            client_key: None,
            width: 28,
        },
        ColumnDef {
            title: "marines",
            field: "marinesCount",
            sort_key: Some("marinesCount"),
            client_key: None,
            width: 10,
        },
    ],
    filter_param: None,
    label: chapter_label,
    cascade: CascadeShape::Dependents {
        flag: "deleteMarines",
    },
};

fn chapter_label(record: &Record) -> String {
    record
        .str_field("name")
        .map(str::to_string)
        .or_else(|| record.id().map(|id| format!("#{}", id)))
        .unwrap_or_else(|| "-".to_string())
}
