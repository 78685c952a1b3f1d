use std::path::PathBuf;

use anyhow::Context;
use anyhow::bail;
use taskboard_attachments::AttachmentSlot;
use taskboard_attachments::EditSession;
use taskboard_attachments::ReconcileError;
use taskboard_attachments::ReconcileWarning;
use taskboard_attachments::Reconciler;
use taskboard_attachments::SlotKey;
use taskboard_attachments_api::AttachmentRef;
use taskboard_attachments_api::TaskFields;
use taskboard_attachments_api::TaskId;
use taskboard_attachments_client::media::infer_image_mime;
use tracing::warn;

use crate::cli::CleanupArgs;
use crate::cli::EditArgs;
use crate::cli::MoveArg;
use crate::cli::MoveKey;
use crate::cli::ShowArgs;

pub(crate) async fn show(reconciler: &Reconciler, args: &ShowArgs) -> anyhow::Result<()> {
    let task_id = TaskId::new(args.task_id.as_str());
    let record = reconciler
        .record_store()
        .get_task(&task_id)
        .await
        .with_context(|| format!("failed to load task {task_id}"))?;

    print_fields(&record.id, &record.fields);
    if let Some(updated_at) = record.updated_at {
        println!("updated:  {}", updated_at.to_rfc3339());
    }
    print_refs(reconciler, &record.ordered_refs);
    Ok(())
}

pub(crate) async fn edit(reconciler: &Reconciler, args: EditArgs) -> anyhow::Result<()> {
    let task_id = TaskId::new(args.task_id.as_str());
    let record = reconciler
        .record_store()
        .get_task(&task_id)
        .await
        .with_context(|| format!("failed to load task {task_id}"))?;
    let mut session = EditSession::open(&record)
        .with_context(|| format!("task {task_id} cannot be edited"))?;

    let files = read_images(&args.add).await?;
    stage_changes(&mut session, &args.remove, files, &args.moves)?;

    let fields_changed = args.title.is_some() || args.priority.is_some();
    if let Some(title) = args.title {
        session.fields_mut().title = title;
    }
    if let Some(priority) = args.priority {
        session.fields_mut().priority = priority.into();
    }

    let plan = session.plan();
    println!("plan for task {task_id}:");
    for r in &plan.to_delete {
        println!("  delete {r}");
    }
    for local_id in &plan.to_upload {
        println!("  upload {local_id}");
    }
    println!("  order:");
    for (idx, slot) in session.attachments().snapshot().iter().enumerate() {
        match slot {
            AttachmentSlot::Pending {
                local_id,
                payload,
                mime_hint,
            } => println!(
                "    {idx}: {local_id} ({mime_hint}, {} bytes)",
                payload.len()
            ),
            AttachmentSlot::Persisted { attachment_ref } => println!("    {idx}: {attachment_ref}"),
        }
    }

    if args.dry_run {
        session.cancel();
        println!("dry run: nothing was uploaded, deleted, or saved");
        return Ok(());
    }
    if !session.is_dirty() && !fields_changed {
        session.cancel();
        println!("no changes");
        return Ok(());
    }

    match session.commit(reconciler).await {
        Ok(outcome) => {
            print_warnings(&outcome.warnings);
            println!("saved task {task_id}");
            print_refs(reconciler, &outcome.ordered_refs);
            Ok(())
        }
        Err(ReconcileError::Record {
            error,
            orphaned_refs,
            warnings,
        }) => {
            print_warnings(&warnings);
            if !orphaned_refs.is_empty() {
                eprintln!("uploaded but unreferenced:");
                for r in &orphaned_refs {
                    eprintln!("  {r}");
                }
                let refs = orphaned_refs
                    .iter()
                    .map(AttachmentRef::as_str)
                    .collect::<Vec<_>>()
                    .join(" ");
                eprintln!("run `taskboard cleanup {refs}` to delete them");
            }
            Err(error).with_context(|| format!("failed to save task {task_id}"))
        }
    }
}

/// An image read from disk, not yet part of the session.
struct LocalImage {
    path: PathBuf,
    payload: Vec<u8>,
    mime: String,
}

async fn read_images(paths: &[PathBuf]) -> anyhow::Result<Vec<LocalImage>> {
    let mut images = Vec::with_capacity(paths.len());
    for path in paths {
        let Some(mime) = infer_image_mime(path) else {
            bail!("{} is not a supported image", path.display());
        };
        let payload = tokio::fs::read(path)
            .await
            .with_context(|| format!("failed to read {}", path.display()))?;
        images.push(LocalImage {
            path: path.clone(),
            payload,
            mime,
        });
    }
    Ok(images)
}

/// Apply removes, then adds, then moves. Removing first frees slots so a full
/// task can swap an attachment in one edit.
fn stage_changes(
    session: &mut EditSession,
    remove: &[String],
    images: Vec<LocalImage>,
    moves: &[MoveArg],
) -> anyhow::Result<()> {
    for r in remove {
        let key = SlotKey::Persisted(AttachmentRef::new(r.as_str()));
        if session.attachments_mut().remove(&key).is_none() {
            bail!("{r} is not attached to task {}", session.task_id());
        }
    }

    let mut added: Vec<SlotKey> = Vec::with_capacity(images.len());
    for image in images {
        let slot = session
            .attachments_mut()
            .add(image.payload, image.mime)
            .with_context(|| format!("cannot attach {}", image.path.display()))?;
        added.push(slot.key());
    }

    for mv in moves {
        let key = match &mv.key {
            MoveKey::Added(n) => added
                .get(n - 1)
                .cloned()
                .with_context(|| format!("#{n} does not name an added file"))?,
            MoveKey::Ref(r) => SlotKey::Persisted(AttachmentRef::new(r.as_str())),
        };
        if session.attachments().position(&key).is_none() {
            bail!("{key} is not in the attachment list");
        }
        session.attachments_mut().reorder(&key, mv.index);
    }
    Ok(())
}

pub(crate) async fn cleanup(reconciler: &Reconciler, args: &CleanupArgs) -> anyhow::Result<()> {
    let refs: Vec<AttachmentRef> = args
        .refs
        .iter()
        .map(|r| AttachmentRef::new(r.as_str()))
        .collect();
    let failures = reconciler.cleanup_orphans(&refs).await;
    let deleted = refs.len() - failures.len();
    println!("deleted {deleted} of {}", refs.len());
    if failures.is_empty() {
        return Ok(());
    }
    for (r, error) in &failures {
        eprintln!("  {r}: {error}");
    }
    bail!("{} blob(s) could not be deleted", failures.len())
}

fn print_fields(task_id: &TaskId, fields: &TaskFields) {
    println!("task:     {task_id}");
    println!("title:    {}", fields.title);
    if let Some(description) = &fields.description {
        println!("details:  {description}");
    }
    println!("priority: {}", fields.priority);
    println!("category: {}", fields.category);
    println!("done:     {}", fields.completed);
    if let Some(due) = fields.due_date {
        println!("due:      {due}");
    }
}

fn print_refs(reconciler: &Reconciler, refs: &[AttachmentRef]) {
    println!("attachments ({}):", refs.len());
    for (idx, r) in refs.iter().enumerate() {
        println!(
            "  {idx}: {r} -> {}",
            reconciler.blob_store().resolve_public_ref(r)
        );
    }
}

fn print_warnings(warnings: &[ReconcileWarning]) {
    for warning in warnings {
        warn!("taskboard.edit.warning {warning}");
        eprintln!("warning: {warning}");
    }
}
