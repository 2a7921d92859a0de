//! Brick loading on top of the orchestrator.
//!
//! Callers hand over bare bricks; the loader wraps them in a template save so
//! headers, asset and material tables are always populated. Bricks read from
//! JSON get every omitted field from the brick template.

use crate::error::Result;
use crate::save::{Brick, SaveData};
use crate::transfer::{LoadReport, Placement, TransferOrchestrator};

/// Loads brick lists through a `TransferOrchestrator`.
pub struct BrickLoader<'a> {
    orchestrator: &'a mut TransferOrchestrator,
    template: SaveData,
}

impl<'a> BrickLoader<'a> {
    /// Loader using `SaveData::template()`.
    pub fn new(orchestrator: &'a mut TransferOrchestrator) -> Self {
        Self {
            orchestrator,
            template: SaveData::template(),
        }
    }

    /// Use `template` for everything except the bricks.
    pub fn with_template(mut self, template: SaveData) -> Self {
        self.template = template;
        self
    }

    /// Save holding `bricks` on top of the template.
    pub fn prepare(&self, bricks: Vec<Brick>) -> SaveData {
        SaveData {
            bricks,
            ..self.template.clone()
        }
    }

    /// Load `bricks` once at `placement`.
    pub async fn load(&mut self, bricks: Vec<Brick>, placement: Placement) -> Result<LoadReport> {
        let save = self.prepare(bricks);
        self.orchestrator.load_now(&save, placement).await
    }

    /// Encode `bricks` once and load a copy at every placement, in order.
    pub async fn instance_load(&mut self, bricks: Vec<Brick>, placements: &[Placement]) -> Result<Vec<LoadReport>> {
        let save = self.prepare(bricks);
        self.orchestrator.multi_place(&save, placements).await
    }
}

/// Parse a JSON array of bricks, filling omitted fields from the brick template.
pub fn bricks_from_json(text: &str) -> Result<Vec<Brick>> {
    Ok(serde_json::from_str(text)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::save::{BrickColor, Direction};

    #[test]
    fn test_bricks_from_json_template() {
        let bricks = bricks_from_json(r#"[{ "position": [0, 0, 10], "size": [5, 5, 6] }, {}]"#).unwrap();
        assert_eq!(bricks.len(), 2);
        assert_eq!(bricks[0].size, [5, 5, 6]);
        assert_eq!(bricks[0].color, BrickColor::Custom([255, 255, 255, 255]));
        assert_eq!(bricks[1].direction, Direction::ZPositive);
        assert!(bricks[1].visibility);
    }

    #[test]
    fn test_bricks_from_json_rejects_garbage() {
        assert!(matches!(
            bricks_from_json("{\"not\": \"a list\"}"),
            Err(crate::error::Error::Json(_))
        ));
    }

    #[test]
    fn test_template_save() {
        let template = SaveData::template();
        assert_eq!(template.map, "Unknown");
        assert_eq!(template.brick_assets, vec!["PB_DefaultMicroBrick".to_string()]);
        assert_eq!(
            template.materials,
            vec!["BMC_Plastic", "BMC_Metallic", "BMC_Glow", "BMC_Glass", "BMC_Hologram"]
        );
        assert_eq!(template.brick_owners.len(), 1);
        assert!(template.preview.is_none());
    }
}
