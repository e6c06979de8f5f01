//! Conflict lookup over persisted products
use std::collections::BTreeSet;
use tempfile::{TempDir, tempdir};

use ingredient_harvest_lib::application::ConflictQueryEngine;
use ingredient_harvest_lib::domain::{ConflictDefinition, IngredientSet, IngredientStore, ProductIngredientMap, Severity};
use ingredient_harvest_lib::infrastructure::{DatabaseConnection, SqliteIngredientRepository};

struct Fixture {
    _dir: TempDir,
    db: DatabaseConnection,
    engine: ConflictQueryEngine,
    repo: SqliteIngredientRepository,
}

async fn fixture() -> Fixture {
    let dir = tempdir().unwrap();
    let url = format!("sqlite:{}", dir.path().join("conflicts.sqlite3").display());
    let db = DatabaseConnection::new(&url).await.unwrap();
    db.migrate().await.unwrap();
    let engine = ConflictQueryEngine::new(db.pool().clone());
    let repo = SqliteIngredientRepository::new(db.pool().clone());
    Fixture { _dir: dir, db, engine, repo }
}

fn ingredients(names: &[&str]) -> IngredientSet {
    names.iter().collect()
}

fn selection(ids: &[&str]) -> BTreeSet<String> {
    ids.iter().map(|id| id.to_string()).collect()
}

fn citric_retinol() -> ConflictDefinition {
    ConflictDefinition {
        ingredient_a: "Citric Acid".to_string(),
        ingredient_b: "Retinol".to_string(),
        severity: Severity::new(5).unwrap(),
        note: "exfoliating acids destabilize retinoids".to_string(),
    }
}

async fn seed(fixture: &Fixture) {
    let mut products = ProductIngredientMap::new();
    products.insert("P1".to_string(), ingredients(&["Citric Acid", "Water"]));
    products.insert("P2".to_string(), ingredients(&["Retinol", "Glycerin"]));
    products.insert("P3".to_string(), ingredients(&["Water"]));
    fixture.repo.persist_all(&products).await.unwrap();
    fixture.engine.import_definitions(&[citric_retinol()]).await.unwrap();
}

#[tokio::test]
async fn conflict_needs_both_sides_across_the_selection() {
    let fixture = fixture().await;
    seed(&fixture).await;

    let both = fixture.engine.conflicts_for(&selection(&["P1", "P2"])).await.unwrap();
    assert_eq!(both.len(), 1);
    assert_eq!(both[0].first, "Citric Acid");
    assert_eq!(both[0].second, "Retinol");
    assert_eq!(both[0].severity.value(), 5);

    assert!(fixture.engine.conflicts_for(&selection(&["P1"])).await.unwrap().is_empty());
    assert!(fixture.engine.conflicts_for(&selection(&["P2", "P3"])).await.unwrap().is_empty());

    fixture.db.close().await;
}

#[tokio::test]
async fn empty_and_unknown_selections_yield_nothing() {
    let fixture = fixture().await;
    seed(&fixture).await;

    assert!(fixture.engine.conflicts_for(&BTreeSet::new()).await.unwrap().is_empty());
    assert!(fixture.engine.conflicts_for(&selection(&["nope-P404"])).await.unwrap().is_empty());
}

#[tokio::test]
async fn selection_arity_is_not_fixed() {
    let fixture = fixture().await;
    seed(&fixture).await;

    let mut ids: Vec<String> = (0..150).map(|i| format!("missing-P{i}")).collect();
    ids.extend(["P1".to_string(), "P2".to_string(), "P3".to_string()]);
    let many: BTreeSet<String> = ids.into_iter().collect();

    let conflicts = fixture.engine.conflicts_for(&many).await.unwrap();
    assert_eq!(conflicts.len(), 1);
}

#[tokio::test]
async fn reseeding_does_not_duplicate_conflicts() {
    let fixture = fixture().await;
    seed(&fixture).await;
    seed(&fixture).await;

    let conflicts = fixture.engine.conflicts_for(&selection(&["P1", "P2", "P3"])).await.unwrap();
    assert_eq!(conflicts.len(), 1);
    assert_eq!(fixture.repo.product_count().await.unwrap(), 3);
}
