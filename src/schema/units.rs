use super::*;

pub const CATEGORIES: &[&str] = &["ASSAULT", "SUPPRESSOR", "TERMINATOR", "CHAPLAIN"];

pub const WEAPON_TYPES: &[&str] = &[
    "BOLT_PISTOL",
    "COMBI_FLAMER",
    "COMBI_PLASMA_GUN",
    "FLAMER",
    "MULTI_MELTA",
];

pub static UNITS: EntitySchema = EntitySchema {
    kind: EntityKind::Units,
    collection: "/api/spacemarines",
    title: "Units",
    singular: "unit",
    fields: &[
        FieldDef {
            name: "name",
            label: "name",
            kind: FieldKind::Text,
            nullable: false,
        },
        FieldDef {
            name: "health",
            label: "health",
            kind: FieldKind::Integer {
                min: 1,
                max: i64::MAX,
            },
            nullable: false,
        },
        FieldDef {
            name: "heartCount",
            label: "heart count",
            kind: FieldKind::Integer { min: 1, max: 3 },
            nullable: false,
        },
        FieldDef {
            name: "category",
            label: "category",
            kind: FieldKind::Enumerated(CATEGORIES),
            nullable: false,
        },
        FieldDef {
            name: "weaponType",
            label: "weapon type",
            kind: FieldKind::Enumerated(WEAPON_TYPES),
            nullable: false,
        },
        FieldDef {
            name: "coordinatesId",
            label: "coordinates",
            kind: FieldKind::Reference {
                target: EntityKind::Coordinates,
                embedded: "coordinates",
            },
            nullable: false,
        },
        FieldDef {
            name: "chapterId",
            label: "chapter",
            kind: FieldKind::Reference {
                target: EntityKind::Chapters,
                embedded: "chapter",
            },
            nullable: true,
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
            width: 18,
        },
        ColumnDef {
            title: "health",
            field: "health",
            sort_key: Some("health"),
            client_key: None,
            width: 8,
        },
        ColumnDef {
            title: "hearts",
            field: "heartCount",
            sort_key: Some("heartCount"),
            client_key: None,
            width: 7,
        },
        ColumnDef {
            title: "category",
            field: "category",
            sort_key: Some("category"),
            client_key: None,
            width: 12,
        },
        ColumnDef {
            title: "weapon",
            field: "weaponType",
            sort_key: Some("weaponType"),
            client_key: None,
            width: 17,
        },
        ColumnDef {
            title: "coordinates",
            field: "coordinatesId",
            sort_key: Some("coordinates"),
            client_key: Some(coordinates_key),
            width: 18,
        },
        ColumnDef {
            title: "chapter",
            field: "chapterId",
            sort_key: Some("chapter"),
            client_key: Some(chapter_key),
            width: 18,
        },
    ],
    filter_param: Some("nameFilter"),
    label: unit_label,
    cascade: CascadeShape::References,
};

fn unit_label(record: &Record) -> String {
    match (record.str_field("name"), record.id()) {
        (Some(name), Some(id)) => format!("{} (ID: {})", name, id),
        (Some(name), None) => name.to_string(),
        (None, Some(id)) => format!("#{}", id),
        (None, None) => "-".to_string(),
    }
}

fn coordinates_key(record: &Record) -> SortValue {
    match record.embedded("coordinates") {
        Some(c) => SortValue::text(format!(
            "{},{}",
            raw_value(c.get("x")),
            raw_value(c.get("y"))
        )),
        None => SortValue::Null,
    }
}

fn chapter_key(record: &Record) -> SortValue {
    record
        .embedded("chapter")
        .and_then(|c| c.str_field("name").map(SortValue::text))
        .unwrap_or(SortValue::Null)
}
