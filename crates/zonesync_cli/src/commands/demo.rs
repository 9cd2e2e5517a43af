//! Demo command implementation.
//!
//! Runs two engines ("phone" and "laptop") against one in-memory store and
//! walks through creation, sync, a conflicting edit, sharing, deletion and
//! cursor expiry.

use serde::Serialize;
use std::sync::Arc;
use tracing::info;
use zonesync_engine::{CachedRecord, EngineConfig, RetryStrategy, SyncEngine, SyncReport};
use zonesync_protocol::{
    merge_fields, DatabaseScope, FieldValue, ListDraft, ListFields, Record, TodoDraft, TodoFields,
};
use zonesync_server::MemoryRemoteStore;

/// Outcome of one demo step.
#[derive(Debug, Serialize)]
pub struct DemoStep {
    /// What the step did.
    pub name: String,
    /// Records inserted or replaced in the syncing device's cache.
    pub upserted: usize,
    /// Records removed from the syncing device's cache.
    pub deleted: usize,
    /// Extra information.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Final state of the demo.
#[derive(Debug, Serialize)]
pub struct DemoResult {
    /// Well-known zone used by both devices.
    pub zone: String,
    /// Steps in execution order.
    pub steps: Vec<DemoStep>,
    /// List titles on the laptop.
    pub lists: Vec<String>,
    /// Todo titles on the laptop.
    pub todos: Vec<String>,
    /// Shares on the laptop.
    pub shares: usize,
    /// Completed syncs on the laptop.
    pub syncs_completed: u64,
    /// Automatic retries on the laptop.
    pub retries: u64,
}

/// Runs the demo command.
pub async fn run(zone: &str, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let private = DatabaseScope::Private;
    let store = Arc::new(MemoryRemoteStore::new());
    let phone = SyncEngine::new(EngineConfig::new(zone), store.clone());
    let laptop = SyncEngine::new(EngineConfig::new(zone), store.clone());
    let mut steps = Vec::new();

    phone.start().await?;
    laptop.start().await?;

    let groceries = phone
        .create_record(private, ListDraft::new("Groceries")?, None)
        .await?;
    let milk = phone
        .create_record(private, TodoDraft::new("Milk")?, Some(&groceries.id))
        .await?;
    let eggs = phone
        .create_record(
            private,
            TodoDraft::new("Eggs")?.with_notes("free range"),
            Some(&groceries.id),
        )
        .await?;
    steps.push(DemoStep {
        name: "phone creates a list with two todos".into(),
        upserted: 3,
        deleted: 0,
        detail: None,
    });

    let reports = laptop.fetch_all_updates().await?;
    steps.push(sync_step("laptop syncs", &reports, None));

    // Both devices edit the same todo; the laptop's save conflicts.
    let mut phone_edit = phone.get(private, &milk.id).ok_or("milk missing on phone")?;
    phone_edit.set_field("notes", FieldValue::String("2 litres".into()));
    phone.save(private, phone_edit).await?;

    let mut laptop_edit = laptop
        .get(private, &milk.id)
        .ok_or("milk missing on laptop")?;
    laptop_edit.set_field("title", FieldValue::String("Oat milk".into()));
    let saved = match laptop.save(private, laptop_edit.clone()).await {
        Ok(saved) => saved,
        Err(e) => {
            let strategy = e.strategy().cloned();
            let Some(RetryStrategy::MergeAndRetry {
                ancestor,
                server: Some(server),
                ..
            }) = strategy
            else {
                return Err(e.into());
            };
            info!(record = %milk.id, "merging conflicting edit");
            let merged = merge_fields(ancestor.as_deref(), &laptop_edit, &server);
            laptop.save(private, merged).await?
        }
    };
    let fields = TodoFields::from_record(&saved)?;
    steps.push(DemoStep {
        name: "laptop merges a conflicting edit".into(),
        upserted: 1,
        deleted: 0,
        detail: Some(format!(
            "title {:?}, notes {:?}",
            fields.title,
            fields.notes.unwrap_or_default()
        )),
    });

    let share = phone.share_for(private, &groceries).await?;
    let reports = laptop.fetch_all_updates().await?;
    steps.push(sync_step(
        "phone shares the list, laptop syncs",
        &reports,
        Some(share.id.to_string()),
    ));

    phone.delete(private, &eggs.id).await?;
    let reports = laptop.fetch_all_updates().await?;
    steps.push(sync_step("phone deletes a todo, laptop syncs", &reports, None));

    store.expire_tokens(private);
    let reports = laptop.fetch_all_updates_with_retry().await?;
    steps.push(sync_step(
        "change tokens expire, laptop refetches",
        &reports,
        None,
    ));

    let stats = laptop.stats();
    let result = DemoResult {
        zone: zone.to_string(),
        steps,
        lists: titles(&laptop.lists_view(), |r| {
            ListFields::from_record(r).map(|f| f.title).ok()
        }),
        todos: titles(&laptop.todos_view(), |r| {
            TodoFields::from_record(r).map(|f| f.title).ok()
        }),
        shares: laptop.shares_view().len(),
        syncs_completed: stats.syncs_completed,
        retries: stats.retries,
    };

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        _ => {
            print_text_output(&result);
        }
    }

    Ok(())
}

fn sync_step(name: &str, reports: &[SyncReport], detail: Option<String>) -> DemoStep {
    DemoStep {
        name: name.to_string(),
        upserted: reports.iter().map(|r| r.upserted).sum(),
        deleted: reports.iter().map(|r| r.deleted).sum(),
        detail,
    }
}

fn titles(
    records: &[CachedRecord],
    title: impl Fn(&Record) -> Option<String>,
) -> Vec<String> {
    let mut titles: Vec<String> = records.iter().filter_map(|c| title(&c.record)).collect();
    titles.sort();
    titles
}

fn print_text_output(result: &DemoResult) {
    println!("Demo in zone {:?}", result.zone);
    println!();
    for (i, step) in result.steps.iter().enumerate() {
        println!(
            "{}. {} (+{} / -{})",
            i + 1,
            step.name,
            step.upserted,
            step.deleted
        );
        if let Some(detail) = &step.detail {
            println!("     {detail}");
        }
    }
    println!();
    println!("Laptop cache:");
    println!("  lists:  {}", result.lists.join(", "));
    println!("  todos:  {}", result.todos.join(", "));
    println!("  shares: {}", result.shares);
    println!(
        "  syncs completed: {}, retries: {}",
        result.syncs_completed, result.retries
    );
}
