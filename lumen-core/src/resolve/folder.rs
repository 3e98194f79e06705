use lumen_model::{ItemKind, LibraryItem};

use crate::error::Result;
use crate::resolve::{ItemResolver, ResolveContext};

/// Fallback resolver: any directory no earlier resolver claimed becomes a
/// plain folder, or a collection folder when it sits directly under the
/// physical root. Registered last.
#[derive(Debug, Default)]
pub struct FolderResolver;

impl ItemResolver for FolderResolver {
    fn descriptor(&self) -> &'static str {
        "folder"
    }

    fn try_resolve(
        &self,
        ctx: &ResolveContext<'_>,
    ) -> Result<Option<LibraryItem>> {
        if !ctx.is_directory() {
            return Ok(None);
        }

        let under_physical_root = ctx
            .parent
            .is_some_and(|p| p.kind == ItemKind::Folder && p.parent_id.is_none());
        let kind = if under_physical_root {
            ItemKind::CollectionFolder
        } else {
            ItemKind::Folder
        };

        Ok(Some(
            LibraryItem::new(kind, ctx.entry.name.clone())
                .with_path(ctx.entry.path.clone()),
        ))
    }
}
