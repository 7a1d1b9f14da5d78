use std::sync::Arc;
use std::sync::mpsc;
use std::time::Duration;

use anyhow::{Context, Result};

use muster::channel::PushChannel;
use muster::config::ConsoleConfig;
use muster::model::{EntityKind, Notification, RecordId};
use muster::remote::{Report, StoreSet};
use muster::view::{LoadOutcome, ReplicatedView};

use crate::Commands;

pub(crate) fn handle_command(cfg: &ConsoleConfig, command: Commands) -> Result<()> {
    match command {
        Commands::List {
            kind,
            page,
            sort,
            desc,
            filter,
            json,
        } => list(cfg, kind, page, sort.as_deref(), desc, filter, json),
        Commands::Watch { count } => watch(cfg, count),
        Commands::AverageHeartCount => report(cfg, Report::AverageHeartCount),
        Commands::CountByHealth { health } => report(cfg, Report::CountBelowHealth(health)),
        Commands::SearchByName { name } => report(cfg, Report::SearchByName(name)),
        Commands::RemoveFromChapter { id } => remove_from_chapter(cfg, RecordId(id)),
    }
}

fn report(cfg: &ConsoleConfig, report: Report) -> Result<()> {
    let ops = StoreSet::http(cfg)?.special();
    let answer = report.run(ops.as_ref())?;
    println!("{}", report.summary(&answer));
    for line in answer.lines() {
        println!("{}", line);
    }
    Ok(())
}

fn remove_from_chapter(cfg: &ConsoleConfig, id: RecordId) -> Result<()> {
    let stores = StoreSet::http(cfg)?;
    let schema = EntityKind::Units.schema();
    let mut unit = stores
        .get(EntityKind::Units)
        .fetch_one(id)
        .with_context(|| format!("fetch unit {}", id))?;
    schema.normalize(&mut unit);
    let label = schema.label_of(&unit);
    if unit.get("chapterId").and_then(RecordId::from_value).is_none() {
        anyhow::bail!("unit \"{}\" has no chapter", label);
    }
    let chapter = schema.cell_text(&unit, "chapterId");
    stores.special().remove_from_chapter(id)?;
    println!("Removed unit \"{}\" from chapter \"{}\"", label, chapter);
    Ok(())
}

fn list(
    cfg: &ConsoleConfig,
    kind: EntityKind,
    page: usize,
    sort: Option<&str>,
    desc: bool,
    filter: Option<String>,
    json: bool,
) -> Result<()> {
    let schema = kind.schema();
    let mut view = ReplicatedView::new(schema, cfg.page_size);
    if let Some(field) = sort {
        if !view.sort_toggle(field) {
            let keys: Vec<&str> = schema.columns.iter().filter_map(|c| c.sort_key).collect();
            anyhow::bail!(
                "cannot sort {} by `{}` (one of: {})",
                kind,
                field,
                keys.join(", ")
            );
        }
        if desc {
            view.sort_toggle(field);
        }
    }
    if filter.is_some() && !view.set_filter(filter) {
        anyhow::bail!("{} cannot be filtered", kind);
    }

    let store = StoreSet::http(cfg)?.get(kind);
    let mut ticket = view.begin_load();
    ticket.query.index = page;
    let result = store.fetch_page(&ticket.query);
    let total = result.as_ref().map(|p| p.total_pages).unwrap_or(0);
    if let LoadOutcome::Failed(msg) = view.finish_load(ticket.generation, result) {
        anyhow::bail!(msg);
    }

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(view.records()).context("serialize records json")?
        );
        return Ok(());
    }

    let header: Vec<String> = schema
        .columns
        .iter()
        .map(|c| pad(c.title, c.width))
        .collect();
    println!("{}", header.join(" "));
    for i in 0..view.records().len() {
        let cells: Vec<String> = schema
            .columns
            .iter()
            .map(|c| pad(&view.cell_text(i, c.field), c.width))
            .collect();
        println!("{}", cells.join(" "));
    }
    if total == 0 {
        println!("(no records)");
    } else {
        println!("page {}/{}", page + 1, total);
    }
    Ok(())
}

fn pad(s: &str, width: u16) -> String {
    let width = width as usize;
    let mut out: String = s.chars().take(width).collect();
    let len = out.chars().count();
    out.extend(std::iter::repeat_n(' ', width - len));
    out
}

fn watch(cfg: &ConsoleConfig, count: Option<usize>) -> Result<()> {
    let mut channel = PushChannel::connect(cfg.push_url(), cfg.channel_settings());
    let (tx, rx) = mpsc::channel::<Notification>();
    let mut subscription = channel.subscribe(Arc::new(move |n: &Notification| {
        tx.send(n.clone())
            .context("watch output closed")
    }));
    eprintln!("watching {}", channel.url());

    let mut seen = 0usize;
    let mut connected = false;
    loop {
        if channel.is_connected() != connected {
            connected = !connected;
            eprintln!("{}", if connected { "connected" } else { "disconnected" });
        }
        match rx.recv_timeout(Duration::from_millis(250)) {
            Ok(n) => {
                let views: Vec<&str> = muster::router::targets(&n.kind)
                    .iter()
                    .map(|k| k.as_str())
                    .collect();
                println!(
                    "{}\t{}\t{}",
                    n.kind,
                    n.subject_id.as_deref().unwrap_or("-"),
                    if views.is_empty() {
                        "(ignored)".to_string()
                    } else {
                        views.join(",")
                    }
                );
                seen += 1;
                if count.is_some_and(|c| seen >= c) {
                    break;
                }
            }
            Err(mpsc::RecvTimeoutError::Timeout) => {}
            Err(mpsc::RecvTimeoutError::Disconnected) => break,
        }
    }

    subscription.dispose();
    channel.shutdown();
    Ok(())
}
