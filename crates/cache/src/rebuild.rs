//! The full rebuild pipeline.
//!
//! Every catalog table is filled in its own write transaction, in a fixed
//! order: items, monsters, ui, housing. The dependency edge table is seeded
//! last from the files the active mods touch. Lists that feed the same table
//! are fetched concurrently, but rows are always written in list order.

use exn::{OptionExt, ResultExt};
use futures::future::try_join_all;
use futures::{StreamExt, TryStreamExt, stream};
use std::time::Instant;
use tracing::{debug, info, instrument};

use crate::Database;
use crate::catalog::category;
use crate::dependencies::DependencyCache;
use crate::error::{ErrorKind, Result};
use crate::models::{CatalogDomain, CatalogItem, Language, UiKind};
use crate::sources::{CatalogExtractor, Sources};

/// Populate an empty store from the collaborators.
#[instrument(level = "info", skip_all, fields(%language))]
pub(crate) async fn populate(db: &Database, sources: &Sources, language: Language, seed_concurrency: usize) -> Result<()> {
    let extractor = sources.extractor.as_ref();
    populate_items(db, extractor).await?;
    populate_monsters(db, extractor, language).await?;
    populate_ui(db, extractor).await?;
    populate_housing(db, extractor).await?;
    seed_dependencies(db, sources, seed_concurrency).await?;
    Ok(())
}

/// Fetch several lists concurrently, keeping them in request order.
async fn list_all(
    extractor: &dyn CatalogExtractor,
    domains: &[CatalogDomain],
) -> Result<Vec<(CatalogDomain, Vec<CatalogItem>)>> {
    try_join_all(domains.iter().map(|&domain| async move {
        let items = extractor.list_uncached(domain).await?;
        debug!(%domain, count = items.len(), "listed catalog domain");
        Ok::<_, crate::error::Error>((domain, items))
    }))
    .await
}

async fn populate_items(db: &Database, extractor: &dyn CatalogExtractor) -> Result<()> {
    let items = extractor.list_uncached(CatalogDomain::Equipment).await?;
    let mut tx = db.begin_write().await?;
    for item in &items {
        let model = item.require_model()?;
        sqlx::query(include_str!("../queries/insert_item.sql"))
            .bind(item.exd_id)
            .bind(model.primary_id)
            .bind(model.secondary_id)
            .bind(model.imc_variant)
            .bind(item.slot.as_deref())
            .bind(item.secondary_category.as_deref())
            .bind(&item.name)
            .bind(item.icon_id)
            .bind(model.is_weapon)
            .execute(tx.conn())
            .await
            .or_raise(|| ErrorKind::Database)?;
    }
    tx.commit().await?;
    info!(count = items.len(), "populated items");
    Ok(())
}

/// Category a creature family is stored (and later listed) under.
fn creature_category(domain: CatalogDomain) -> Result<&'static str> {
    Ok(match domain {
        CatalogDomain::Minions => category::MINIONS,
        CatalogDomain::Mounts => category::MOUNTS,
        CatalogDomain::Ornaments => category::ORNAMENTS,
        CatalogDomain::Pets => category::PETS,
        _ => exn::bail!(ErrorKind::InvalidData("creature domain")),
    })
}

async fn populate_monsters(db: &Database, extractor: &dyn CatalogExtractor, language: Language) -> Result<()> {
    let mut domains = vec![CatalogDomain::Minions, CatalogDomain::Mounts];
    if language.has_ornaments() {
        domains.push(CatalogDomain::Ornaments);
    }
    domains.push(CatalogDomain::Pets);
    let lists = list_all(extractor, &domains).await?;

    let mut tx = db.begin_write().await?;
    let mut count = 0;
    for (domain, items) in &lists {
        let category = creature_category(*domain)?;
        for item in items {
            let model = item.require_model()?;
            let model_type = model.model_type.ok_or_raise(|| ErrorKind::InvalidData("model type"))?;
            sqlx::query(include_str!("../queries/insert_monster.sql"))
                .bind(&item.name)
                .bind(category)
                .bind(model.primary_id)
                .bind(model.secondary_id)
                .bind(model.imc_variant)
                .bind(model_type.as_str())
                .execute(tx.conn())
                .await
                .or_raise(|| ErrorKind::Database)?;
            count += 1;
        }
    }
    tx.commit().await?;
    info!(count, "populated monsters");
    Ok(())
}

async fn populate_ui(db: &Database, extractor: &dyn CatalogExtractor) -> Result<()> {
    let domains = UiKind::ALL.map(CatalogDomain::Ui);
    let lists = list_all(extractor, &domains).await?;

    let mut tx = db.begin_write().await?;
    let mut count = 0;
    for item in lists.iter().flat_map(|(_, items)| items) {
        sqlx::query(include_str!("../queries/insert_ui.sql"))
            .bind(&item.name)
            .bind(item.secondary_category.as_deref())
            .bind(item.tertiary_category.as_deref())
            .bind(item.ui_path.as_deref())
            .bind(item.icon_id)
            .execute(tx.conn())
            .await
            .or_raise(|| ErrorKind::Database)?;
        count += 1;
    }
    tx.commit().await?;
    info!(count, "populated ui");
    Ok(())
}

async fn populate_housing(db: &Database, extractor: &dyn CatalogExtractor) -> Result<()> {
    let items = extractor.list_uncached(CatalogDomain::Furniture).await?;
    let mut tx = db.begin_write().await?;
    for item in &items {
        let model = item.require_model()?;
        sqlx::query(include_str!("../queries/insert_housing.sql"))
            .bind(&item.name)
            .bind(item.secondary_category.as_deref())
            .bind(item.tertiary_category.as_deref())
            .bind(model.primary_id)
            .bind(item.icon_id)
            .execute(tx.conn())
            .await
            .or_raise(|| ErrorKind::Database)?;
    }
    tx.commit().await?;
    info!(count = items.len(), "populated housing");
    Ok(())
}

/// Resolve and cache the children of every file touched by an active mod.
async fn seed_dependencies(db: &Database, sources: &Sources, concurrency: usize) -> Result<()> {
    let started = Instant::now();
    let paths = sources.mod_list.active_mod_paths().await?;
    let total = paths.len();
    let deps = DependencyCache::new(db, sources.resolver.as_ref());
    stream::iter(paths)
        .map(Ok)
        .try_for_each_concurrent(concurrency.max(1), |path| async move {
            deps.update_file_children(&path, None).await
        })
        .await?;
    info!(files = total, elapsed = ?started.elapsed(), "seeded dependency cache");
    Ok(())
}
