//! Structured save data consumed by the codec.
//!
//! Every struct derives serde with struct-level defaults, so a JSON document
//! only needs the fields it wants to override. The defaults are the loader
//! templates: a save with one default micro-brick asset, the five stock
//! materials and a single placeholder owner, and white, fully collidable
//! bricks facing up.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A player reference (author, host or brick owner).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub name: String,
    pub id: Uuid,
}

impl Default for User {
    fn default() -> Self {
        Self {
            name: "Unknown".to_string(),
            id: Uuid::nil(),
        }
    }
}

/// Entry in the save's owner table; bricks refer to it by index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrickOwner {
    pub id: Uuid,
    pub name: String,
    /// Number of bricks attributed to this owner
    pub bricks: u32,
}

impl Default for BrickOwner {
    fn default() -> Self {
        let user = User::default();
        Self {
            id: user.id,
            name: user.name,
            bricks: 0,
        }
    }
}

/// Image format of an embedded preview.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PreviewFormat {
    Png = 1,
    Jpeg = 2,
}

/// Preview screenshot stored after the second header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preview {
    pub format: PreviewFormat,
    pub data: Vec<u8>,
}

/// Axis a brick's top faces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Direction {
    XPositive = 0,
    XNegative = 1,
    YPositive = 2,
    YNegative = 3,
    #[default]
    ZPositive = 4,
    ZNegative = 5,
}

/// Quarter-turn rotation around the facing axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Rotation {
    #[default]
    Deg0 = 0,
    Deg90 = 1,
    Deg180 = 2,
    Deg270 = 3,
}

/// Number of distinct orientations (6 directions x 4 rotations).
pub const ORIENTATION_COUNT: u32 = 24;

/// Pack direction and rotation into the orientation index.
pub fn orientation(direction: Direction, rotation: Rotation) -> u32 {
    ((direction as u32) << 2) | rotation as u32
}

/// Per-channel collision flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Collision {
    pub player: bool,
    pub weapon: bool,
    pub interaction: bool,
    pub tool: bool,
}

impl Collision {
    /// Same flag on every channel.
    pub fn all(enabled: bool) -> Self {
        Self {
            player: enabled,
            weapon: enabled,
            interaction: enabled,
            tool: enabled,
        }
    }
}

impl Default for Collision {
    fn default() -> Self {
        Self::all(true)
    }
}

/// Brick color: a palette index or an explicit RGBA value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BrickColor {
    Index(u32),
    Custom([u8; 4]),
}

impl Default for BrickColor {
    fn default() -> Self {
        BrickColor::Custom([255, 255, 255, 255])
    }
}

/// Value of a component property. The schema decides how it is written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum UnrealValue {
    Boolean(bool),
    Number(f64),
    Text(String),
    Array(Vec<f64>),
}

impl UnrealValue {
    /// Short name of the value's shape, for error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            UnrealValue::Boolean(_) => "boolean",
            UnrealValue::Number(_) => "number",
            UnrealValue::Text(_) => "text",
            UnrealValue::Array(_) => "array",
        }
    }
}

/// Declared property of a component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentProperty {
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: String,
}

/// Component definition shared by every brick that carries it.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ComponentSchema {
    pub version: i32,
    /// Properties in wire order
    pub properties: Vec<ComponentProperty>,
}

/// Property values of one component on one brick.
pub type ComponentValues = BTreeMap<String, UnrealValue>;

/// A single brick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Brick {
    /// Index into `SaveData::brick_assets`
    pub asset_name_index: u32,
    /// Procedural size; all zero for fixed-size assets
    pub size: [u32; 3],
    pub position: [i32; 3],
    pub direction: Direction,
    pub rotation: Rotation,
    pub collision: Collision,
    pub visibility: bool,
    /// Index into `SaveData::materials`
    pub material_index: u32,
    /// Index into `SaveData::physical_materials`
    pub physical_index: u32,
    /// 0-10
    pub material_intensity: u32,
    pub color: BrickColor,
    /// Index into `SaveData::brick_owners` (0 is public)
    pub owner_index: u32,
    pub components: BTreeMap<String, ComponentValues>,
}

impl Brick {
    /// Template brick at `position` with the given procedural size.
    pub fn new(position: [i32; 3], size: [u32; 3]) -> Self {
        Self {
            position,
            size,
            ..Self::default()
        }
    }

    /// True if the brick carries an explicit procedural size.
    pub fn is_procedural(&self) -> bool {
        self.size != [0, 0, 0]
    }
}

impl Default for Brick {
    fn default() -> Self {
        Self {
            asset_name_index: 0,
            size: [0, 0, 0],
            position: [0, 0, 0],
            direction: Direction::ZPositive,
            rotation: Rotation::Deg0,
            collision: Collision::default(),
            visibility: true,
            material_index: 0,
            physical_index: 0,
            material_intensity: 0,
            color: BrickColor::default(),
            owner_index: 0,
            components: BTreeMap::new(),
        }
    }
}

/// A complete save ready for encoding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SaveData {
    pub game_version: i32,
    pub map: String,
    pub author: User,
    /// Defaults to the author when absent
    pub host: Option<User>,
    pub description: String,
    /// Raw 8-byte save timestamp
    pub save_time: [u8; 8],
    pub mods: Vec<String>,
    pub brick_assets: Vec<String>,
    /// Palette colors as RGBA
    pub colors: Vec<[u8; 4]>,
    pub materials: Vec<String>,
    pub physical_materials: Vec<String>,
    pub brick_owners: Vec<BrickOwner>,
    pub preview: Option<Preview>,
    pub bricks: Vec<Brick>,
    /// Component schemas by component name
    pub components: BTreeMap<String, ComponentSchema>,
}

impl SaveData {
    /// The save template: stock materials, one micro-brick asset, one owner.
    pub fn template() -> Self {
        Self::default()
    }

    /// Template save holding `bricks`.
    pub fn with_bricks(bricks: Vec<Brick>) -> Self {
        Self {
            bricks,
            ..Self::default()
        }
    }

    /// Parse save data from JSON, filling omitted fields from the template.
    pub fn from_json(text: &str) -> crate::Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Host, falling back to the author.
    pub fn host_or_author(&self) -> &User {
        self.host.as_ref().unwrap_or(&self.author)
    }
}

impl Default for SaveData {
    fn default() -> Self {
        Self {
            game_version: 0,
            map: "Unknown".to_string(),
            author: User::default(),
            host: None,
            description: String::new(),
            save_time: [0; 8],
            mods: Vec::new(),
            brick_assets: vec!["PB_DefaultMicroBrick".to_string()],
            colors: Vec::new(),
            materials: ["BMC_Plastic", "BMC_Metallic", "BMC_Glow", "BMC_Glass", "BMC_Hologram"]
                .iter()
                .map(|m| m.to_string())
                .collect(),
            physical_materials: Vec::new(),
            brick_owners: vec![BrickOwner::default()],
            preview: None,
            bricks: Vec::new(),
            components: BTreeMap::new(),
        }
    }
}
