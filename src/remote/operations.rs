//! `CollectionStore` over HTTP.

use super::http_client::{parse_record, read_json, send};
use super::*;

impl CollectionStore for HttpCollectionStore {
    fn kind(&self) -> EntityKind {
        self.schema.kind
    }

    fn fetch_page(&self, query: &PageQuery) -> ConsoleResult<Page> {
        let mut params: Vec<(&str, String)> = vec![
            ("page", query.index.to_string()),
            ("size", query.size.to_string()),
        ];
        if let Some(sort) = &query.sort {
            if self.schema.is_server_sortable(&sort.field) {
                params.push(("sortBy", sort.field.clone()));
                params.push(("sortOrder", sort.direction.as_param().to_string()));
            }
        }
        let filter = query.filter.as_deref().filter(|f| !f.trim().is_empty());
        if let (Some(param), Some(filter)) = (self.schema.filter_param, filter) {
            params.push((param, filter.to_string()));
        }

        let req = self.client.get(self.url("")).query(&params);
        let resp = send(self.schema.collection, req, "fetch page")?;
        let body = read_json(resp, "fetch page")?;
        let page = parse_page(body, query.index, query.size)?;
        tracing::debug!(
            collection = self.schema.collection,
            index = page.index,
            rows = page.records.len(),
            total_pages = page.total_pages,
            "fetched page"
        );
        Ok(page)
    }

    fn fetch_one(&self, id: RecordId) -> ConsoleResult<Record> {
        let req = self.client.get(self.url(&format!("/{}", id)));
        let resp = send(self.schema.collection, req, "fetch record")?;
        parse_record(read_json(resp, "fetch record")?)
    }

    fn create(&self, payload: &Map<String, Value>) -> ConsoleResult<Record> {
        let req = self.client.post(self.url("")).json(payload);
        let resp = send(self.schema.collection, req, "create")?;
        let record = parse_record(read_json(resp, "create")?)?;
        tracing::info!(
            collection = self.schema.collection,
            id = ?record.id(),
            "created record"
        );
        Ok(record)
    }

    fn update(&self, id: RecordId, payload: &Map<String, Value>) -> ConsoleResult<Record> {
        let req = self.client.put(self.url(&format!("/{}", id))).json(payload);
        let resp = send(self.schema.collection, req, "update")?;
        tracing::info!(collection = self.schema.collection, %id, "updated record");
        match read_json(resp, "update")? {
            // Some servers answer 204; the accepted payload is then the record.
            Value::Null => {
                let mut record = Record::from_map(payload.clone());
                record.set("id", id.to_value());
                Ok(record)
            }
            body => parse_record(body),
        }
    }

    fn remove(&self, id: RecordId, flags: &CascadeFlags) -> ConsoleResult<DeleteOutcome> {
        let mut req = self.client.delete(self.url(&format!("/{}", id)));
        if !flags.is_empty() {
            req = req.query(&flags.query_pairs());
        }
        let resp = send(self.schema.collection, req, "delete")?;
        tracing::info!(collection = self.schema.collection, %id, ?flags, "deleted record");
        match read_json(resp, "delete")? {
            Value::Null => Ok(DeleteOutcome::default()),
            body => serde_json::from_value(body)
                .map_err(|err| ConsoleError::format(format!("parse delete response: {}", err))),
        }
    }

    fn fetch_related(&self, id: RecordId) -> ConsoleResult<RelatedSummary> {
        let req = self.client.get(self.url(&format!("/{}/related", id)));
        let resp = send(self.schema.collection, req, "fetch related")?;
        let related: RelatedResponse = match read_json(resp, "fetch related")? {
            Value::Null => RelatedResponse::default(),
            body => serde_json::from_value(body).map_err(|err| {
                ConsoleError::format(format!("parse related response: {}", err))
            })?,
        };
        Ok(related.into_summary(self.schema))
    }
}
