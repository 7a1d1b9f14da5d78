use super::*;

pub static COORDINATES: EntitySchema = EntitySchema {
    kind: EntityKind::Coordinates,
    collection: "/api/coordinates",
    title: "Coordinates",
    singular: "coordinates",
    fields: &[
        FieldDef {
            name: "x",
            label: "x",
            kind: FieldKind::Float,
            nullable: false,
        },
        // The only nullable numeric field: an empty input clears it instead of sending 0.
        FieldDef {
            name: "y",
            label: "y",
            kind: FieldKind::Float,
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
            title: "x",
            field: "x",
            sort_key: Some("x"),
            client_key: None,
            width: 14,
        },
        ColumnDef {
            title: "y",
            field: "y",
            sort_key: Some("y"),
            client_key: None,
            width: 14,
        },
    ],
    filter_param: None,
    label: coordinates_label,
    cascade: CascadeShape::Dependents {
        flag: "deleteMarines",
    },
};

fn coordinates_label(record: &Record) -> String {
    let y = match record.get("y") {
        None | Some(Value::Null) => "null".to_string(),
        v => display_value(v),
    };
    format!("x:{}, y:{}", display_value(record.get("x")), y)
}
