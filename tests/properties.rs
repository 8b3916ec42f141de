//! Properties that must hold for any selection and any store backend.
//! Randomized cases use a seeded `StdRng` so failures reproduce.

mod common;

use common::*;
use marginalia::document::NodeKind;
use marginalia::{
    resolve_anchor, Anchor, Annotation, AnnotationStore, BoundaryPoint, ChapterPage, DocumentTree, HostPage,
    MemoryStore, NoteStore, ParagraphEnumeration, SelectionRange,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;

/// A random boundary point somewhere inside paragraph `index`
fn point_in(rng: &mut StdRng, tree: &DocumentTree, paragraphs: &ParagraphEnumeration, index: usize) -> BoundaryPoint {
    let p = paragraphs.get(index).unwrap();
    let children = tree.children(p);
    if children.is_empty() || rng.gen_bool(0.3) {
        return BoundaryPoint::new(p, rng.gen_range(0..=children.len()));
    }
    let child = children[rng.gen_range(0..children.len())];
    match tree.kind(child) {
        Some(NodeKind::Text(t)) => BoundaryPoint::new(child, rng.gen_range(0..=t.chars().count())),
        _ => BoundaryPoint::new(child, 0),
    }
}

/// Pages mixing inline markup, quotes and repeated text
fn varied_page(rng: &mut StdRng) -> ChapterPage {
    let n = rng.gen_range(1..12);
    let texts: Vec<String> = (0..n)
        .map(|i| match rng.gen_range(0..4) {
            0 => "Same words again.".to_string(),
            1 => format!("Some *emphasis* in paragraph {}.", i),
            2 => format!("> A quoted line {}.", i),
            _ => paragraph_text("1", i),
        })
        .collect();
    let refs: Vec<&str> = texts.iter().map(String::as_str).collect();
    ChapterPage::from_paragraphs(work(), chapter("1"), &refs)
}

#[test]
fn selections_inside_content_resolve_in_bounds() {
    let mut rng = StdRng::seed_from_u64(7);
    for _ in 0..300 {
        let page = varied_page(&mut rng);
        let paragraphs = page.paragraphs();
        let tree = page.tree();
        let a = rng.gen_range(0..paragraphs.len());
        let b = rng.gen_range(0..paragraphs.len());
        let range = SelectionRange::new(point_in(&mut rng, tree, &paragraphs, a), point_in(&mut rng, tree, &paragraphs, b));

        let anchor = resolve_anchor(tree, &range, &paragraphs).expect("inside content");
        assert!(anchor.start() <= anchor.end());
        assert!(anchor.end() < paragraphs.len());
        assert_eq!(anchor, Anchor::spanning(a, b));
    }
}

#[test]
fn duplicate_text_resolves_by_position() {
    let page = ChapterPage::from_paragraphs(work(), chapter("1"), &["Echo.", "Echo.", "Echo."]);
    let paragraphs = page.paragraphs();
    for i in 0..3 {
        let range = SelectionRange::over_paragraphs(page.tree(), &paragraphs, i, i).unwrap();
        assert_eq!(resolve_anchor(page.tree(), &range, &paragraphs), Anchor::new(i, i));
    }
}

#[tokio::test]
async fn selections_outside_content_create_nothing() {
    let mut rng = StdRng::seed_from_u64(11);
    let store = Arc::new(MemoryStore::new());
    for _ in 0..50 {
        let mut controller = load(varied_page(&mut rng), store.clone()).await;
        let tree = controller.host().tree();
        let chrome: Vec<_> = tree
            .descendants(tree.root())
            .into_iter()
            .filter(|k| !tree.is_inclusive_descendant(*k, controller.host().content_root()))
            .filter(|k| *k != tree.root())
            .collect();
        let outside = BoundaryPoint::new(chrome[rng.gen_range(0..chrome.len())], 0);
        let n = controller.paragraphs().len();
        let idx = rng.gen_range(0..n);
        let inside = point_in(&mut rng, tree, controller.paragraphs(), idx);
        let range = if rng.gen_bool(0.5) {
            SelectionRange::new(outside, inside)
        } else {
            SelectionRange::new(inside, outside)
        };

        assert!(resolve_anchor(tree, &range, controller.paragraphs()).is_none());
        assert!(controller.on_selection_change(Some(&range)).is_err());
        assert!(controller.choose_marker("❤").await.is_err());
    }
    assert!(store.is_empty());
}

fn sample_records(rng: &mut StdRng, n: usize) -> Vec<Annotation> {
    (0..n)
        .map(|i| {
            let start = rng.gen_range(0..20);
            let end = start + rng.gen_range(0..5);
            let chapter_id = format!("{}", rng.gen_range(1..4));
            Annotation::create(
                &work(),
                &chapter(&chapter_id),
                format!("quote {}", i),
                Anchor::new(start, end).unwrap(),
                "⭐",
            )
            .with_note(if rng.gen_bool(0.5) { "a note" } else { "" })
        })
        .collect()
}

async fn check_round_trip<S: AnnotationStore + ?Sized>(store: &S) {
    let mut rng = StdRng::seed_from_u64(3);
    for record in sample_records(&mut rng, 40) {
        store.insert(&record).await.unwrap();
        let chapter = store.query_by_chapter(&record.work_id, &record.chapter_id).await.unwrap();
        assert!(chapter.contains(&record));
        assert_eq!(store.get(&record.note_id).await.unwrap(), Some(record));
    }
}

async fn check_update_idempotent<S: AnnotationStore + ?Sized>(store: &S) {
    let mut rng = StdRng::seed_from_u64(5);
    let records = sample_records(&mut rng, 10);
    for r in &records {
        store.insert(r).await.unwrap();
    }
    let edited = records[4].clone().with_note("changed");

    store.update(&edited).await.unwrap();
    let mut once = store.query_all().await.unwrap();
    store.update(&edited).await.unwrap();
    let mut twice = store.query_all().await.unwrap();
    once.sort_by(|a, b| a.note_id.cmp(&b.note_id));
    twice.sort_by(|a, b| a.note_id.cmp(&b.note_id));
    assert_eq!(once, twice);
    assert_eq!(once.len(), records.len());
}

async fn check_delete<S: NoteStore + ?Sized>(store: Arc<S>) {
    let mut controller = load(chapter_page("1", 6), store.clone()).await;
    let kept = annotate(&mut controller, 0, 2, "❤").await;
    let gone = annotate(&mut controller, 1, 4, "🔥").await;
    drop(controller);

    store.delete(&gone).await.unwrap();
    store.delete(&gone).await.unwrap();
    let ids: Vec<_> = store
        .query_by_work(WORK_ID)
        .await
        .unwrap()
        .into_iter()
        .map(|r| r.note_id)
        .collect();
    assert_eq!(ids, vec![kept.clone()]);

    let controller = load(chapter_page("1", 6), store).await;
    assert_eq!(controller.surface().tagged(&gone).count(), 0);
    assert!(controller.surface().rendered(&kept).is_some());
}

#[tokio::test]
async fn memory_store_properties() {
    check_round_trip(&MemoryStore::new()).await;
    check_update_idempotent(&MemoryStore::new()).await;
    check_delete(Arc::new(MemoryStore::new())).await;
}

#[tokio::test]
async fn sqlite_store_properties() {
    let (_dir, store) = temp_sqlite();
    check_round_trip(&store).await;
    let (_dir, store) = temp_sqlite();
    check_update_idempotent(&store).await;
    let (_dir, store) = temp_sqlite();
    check_delete(Arc::new(store)).await;
}

#[tokio::test]
async fn sqlite_survives_reopen() {
    let (dir, store) = temp_sqlite();
    let mut rng = StdRng::seed_from_u64(9);
    let records = sample_records(&mut rng, 15);
    for r in &records {
        store.insert(r).await.unwrap();
    }
    drop(store);

    let store = reopen(&dir);
    let mut back = store.query_all().await.unwrap();
    let mut expected = records.clone();
    back.sort_by(|a, b| a.note_id.cmp(&b.note_id));
    expected.sort_by(|a, b| a.note_id.cmp(&b.note_id));
    assert_eq!(back, expected);
}
