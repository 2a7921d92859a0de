//! BRS save-file encoding.
//!
//! # File Layout (version 10)
//!
//! ```text
//! +-----------------------+
//! | Magic (3 bytes)       |  "BRS"
//! +-----------------------+
//! | version (2)           |  u16 = 10
//! +-----------------------+
//! | game_version (4)      |  i32
//! +-----------------------+
//! | header 1 (section)    |  map, author, description, author id,
//! |                       |  host name, host id, save time, brick count
//! +-----------------------+
//! | header 2 (section)    |  mods, assets, colors, materials,
//! |                       |  owners, physical materials
//! +-----------------------+
//! | preview               |  u8 format (0 = none) [, i32 len, bytes]
//! +-----------------------+
//! | bricks (section)      |  one bit stream, each brick byte-aligned
//! +-----------------------+
//! | components (section)  |  array of (name, length-prefixed bit stream)
//! +-----------------------+
//! ```
//!
//! Every section is `i32 len | i32 0 | bytes`; compression is never used.
//! Bounded indices use `max(table_len, 2)` as their bound so that
//! single-entry tables still encode with one bit.

use crate::bitio::BitPacker;
use crate::encode::{self, write_array, write_i32, write_identifier, write_string, write_u16};
use crate::error::{EncodingError, Result};
use crate::save::{self, Brick, BrickColor, BrickOwner, SaveData};

/// Magic number for save files: "BRS"
pub const MAGIC: [u8; 3] = *b"BRS";

/// Format version written by this encoder
pub const VERSION: u16 = 10;

/// Exclusive bound for `material_intensity`
pub const MATERIAL_INTENSITY_BOUND: u32 = 11;

/// Encode a complete save into BRS bytes.
///
/// # Errors
/// `EncodingError` if any brick refers outside its tables, a component
/// property is missing or mistyped, or a length overflows i32. No partial
/// output is returned.
pub fn write_save(save: &SaveData) -> Result<Vec<u8>> {
    let header1 = write_header1(save)?;
    let header2 = write_header2(save)?;
    let preview = write_preview(save)?;
    let bricks = write_bricks(save)?;
    let components = write_components(save)?;

    Ok(encode::concat(&[
        &MAGIC,
        &write_u16(VERSION),
        &write_i32(save.game_version),
        &header1,
        &header2,
        &preview,
        &bricks,
        &components,
    ]))
}

fn write_header1(save: &SaveData) -> Result<Vec<u8>> {
    let host = save.host_or_author();
    let brick_count = encode::length_prefix("brick count", save.bricks.len())?;

    encode::write_uncompressed(&[
        &write_string(&save.map)?,
        &write_string(&save.author.name)?,
        &write_string(&save.description)?,
        &write_identifier(&save.author.id)?,
        &write_string(&host.name)?,
        &write_identifier(&host.id)?,
        &save.save_time,
        &write_i32(brick_count),
    ])
}

fn write_header2(save: &SaveData) -> Result<Vec<u8>> {
    encode::write_uncompressed(&[
        &write_array(&save.mods, |m| write_string(m))?,
        &write_array(&save.brick_assets, |a| write_string(a))?,
        &write_array(&save.colors, |c| Ok(encode::bgra(*c).to_vec()))?,
        &write_array(&save.materials, |m| write_string(m))?,
        &write_array(&save.brick_owners, write_owner)?,
        &write_array(&save.physical_materials, |m| write_string(m))?,
    ])
}

fn write_owner(owner: &BrickOwner) -> Result<Vec<u8>> {
    let bricks = i32::try_from(owner.bricks).map_err(|_| EncodingError::ValueOutOfRange {
        operation: "owner brick count",
        value: owner.bricks as u64,
        max: i32::MAX as u64 + 1,
    })?;

    Ok(encode::concat(&[
        &write_identifier(&owner.id)?,
        &write_string(&owner.name)?,
        &write_i32(bricks),
    ]))
}

fn write_preview(save: &SaveData) -> Result<Vec<u8>> {
    match &save.preview {
        None => Ok(vec![0]),
        Some(preview) => {
            let len = encode::length_prefix("preview", preview.data.len())?;
            Ok(encode::concat(&[
                &[preview.format as u8],
                &write_i32(len),
                &preview.data,
            ]))
        }
    }
}

fn write_bricks(save: &SaveData) -> Result<Vec<u8>> {
    let asset_bound = table_bound("asset_name_index", save.brick_assets.len())?;
    let material_bound = table_bound("material_index", save.materials.len())?;
    let physical_bound = table_bound("physical_index", save.physical_materials.len())?;
    let color_bound = table_bound("color index", save.colors.len())?;

    let mut packer = BitPacker::new();
    for brick in &save.bricks {
        packer.align();
        write_brick(
            &mut packer,
            brick,
            asset_bound,
            material_bound,
            physical_bound,
            color_bound,
        )?;
    }

    encode::write_uncompressed(&[&packer.finish()])
}

fn write_brick(
    packer: &mut BitPacker,
    brick: &Brick,
    asset_bound: u32,
    material_bound: u32,
    physical_bound: u32,
    color_bound: u32,
) -> Result<()> {
    packer.write_bounded_int(brick.asset_name_index, asset_bound)?;

    packer.write_bit(brick.is_procedural());
    if brick.is_procedural() {
        for &extent in &brick.size {
            packer.write_packed_unsigned(extent as u64);
        }
    }

    for &coordinate in &brick.position {
        packer.write_packed_signed(coordinate);
    }

    packer.write_bounded_int(
        save::orientation(brick.direction, brick.rotation),
        save::ORIENTATION_COUNT,
    )?;

    packer.write_bit(brick.collision.player);
    packer.write_bit(brick.collision.weapon);
    packer.write_bit(brick.collision.interaction);
    packer.write_bit(brick.collision.tool);
    packer.write_bit(brick.visibility);

    packer.write_bounded_int(brick.material_index, material_bound)?;
    packer.write_bounded_int(brick.physical_index, physical_bound)?;
    packer.write_bounded_int(brick.material_intensity, MATERIAL_INTENSITY_BOUND)?;

    match brick.color {
        BrickColor::Index(index) => {
            packer.write_bit(false);
            packer.write_bounded_int(index, color_bound)?;
        }
        BrickColor::Custom(rgba) => {
            packer.write_bit(true);
            packer.write_bytes(&encode::bgra(rgba));
        }
    }

    packer.write_packed_unsigned(brick.owner_index as u64);
    Ok(())
}

fn write_components(save: &SaveData) -> Result<Vec<u8>> {
    let brick_bound = table_bound("brick index", save.bricks.len())?;
    let names: Vec<&String> = save.components.keys().collect();

    let body = write_array(&names, |name| {
        let schema = &save.components[name.as_str()];

        let indices: Vec<u32> = save
            .bricks
            .iter()
            .enumerate()
            .filter(|(_, brick)| brick.components.contains_key(name.as_str()))
            .map(|(i, _)| i as u32)
            .collect();

        let mut packer = BitPacker::new();
        packer.write_i32(schema.version);
        packer.write_array(&indices, |p, &i| p.write_bounded_int(i, brick_bound))?;
        packer.write_array(&schema.properties, |p, prop| {
            p.write_string(&prop.name)?;
            p.write_string(&prop.type_name)
        })?;

        for &index in &indices {
            let values = &save.bricks[index as usize].components[name.as_str()];
            for prop in &schema.properties {
                let value = values.get(&prop.name).ok_or_else(|| EncodingError::MissingProperty {
                    brick: index as usize,
                    component: name.to_string(),
                    property: prop.name.clone(),
                })?;
                packer.write_unreal(&prop.name, &prop.type_name, value)?;
            }
        }

        Ok(encode::concat(&[&write_string(name)?, &packer.finish_section()?]))
    })?;

    encode::write_uncompressed(&[&body])
}

/// Bound for an index into a table of `len` entries: `max(len, 2)`.
fn table_bound(operation: &'static str, len: usize) -> Result<u32> {
    let len = u32::try_from(len).map_err(|_| EncodingError::LengthOverflow {
        operation,
        length: len,
    })?;
    Ok(len.max(2))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cursor::ByteCursor;
    use crate::error::Error;
    use crate::save::{ComponentProperty, ComponentSchema, Preview, PreviewFormat, UnrealValue};
    use std::collections::BTreeMap;

    /// Walk past a section frame and return its body.
    fn read_section<'a>(cursor: &mut ByteCursor<'a>) -> Vec<u8> {
        let len = i32::from_le_bytes(cursor.take(4, false).unwrap()[..].try_into().unwrap());
        let compressed = i32::from_le_bytes(cursor.take(4, false).unwrap()[..].try_into().unwrap());
        assert_eq!(compressed, 0, "sections are stored uncompressed");
        cursor.take(len as usize, true).unwrap().into_owned()
    }

    fn split(bytes: &[u8]) -> (Vec<u8>, Vec<u8>, u8, Vec<u8>, Vec<u8>) {
        let mut cursor = ByteCursor::new(bytes);
        assert_eq!(&*cursor.take(3, false).unwrap(), b"BRS");
        assert_eq!(&*cursor.take(2, false).unwrap(), &[10, 0]);
        cursor.take(4, false).unwrap();

        let header1 = read_section(&mut cursor);
        let header2 = read_section(&mut cursor);
        let preview = cursor.take(1, false).unwrap()[0];
        let bricks = read_section(&mut cursor);
        let components = read_section(&mut cursor);
        assert!(cursor.is_empty());
        (header1, header2, preview, bricks, components)
    }

    #[test]
    fn test_empty_template_layout() {
        let bytes = write_save(&SaveData::default()).unwrap();
        let (header1, _header2, preview, bricks, components) = split(&bytes);

        // map "Unknown" leads header 1
        assert_eq!(&header1[0..4], &[8, 0, 0, 0]);
        assert_eq!(&header1[4..12], b"Unknown\0");
        // brick count is the last field
        assert_eq!(&header1[header1.len() - 4..], &[0, 0, 0, 0]);

        assert_eq!(preview, 0);
        assert!(bricks.is_empty());
        assert_eq!(components, vec![0, 0, 0, 0]);
    }

    #[test]
    fn test_header2_colors_swapped() {
        let mut save = SaveData::default();
        save.colors = vec![[10, 20, 30, 255]];
        save.mods.clear();
        let bytes = write_save(&save).unwrap();
        let (_, header2, ..) = split(&bytes);

        // mods: empty array
        assert_eq!(&header2[0..4], &[0, 0, 0, 0]);
        // assets: one string "PB_DefaultMicroBrick"
        let asset_len = "PB_DefaultMicroBrick".len() + 1;
        let colors_at = 4 + 4 + 4 + asset_len;
        assert_eq!(&header2[colors_at..colors_at + 4], &[1, 0, 0, 0]);
        assert_eq!(&header2[colors_at + 4..colors_at + 8], &[30, 20, 10, 255]);
    }

    #[test]
    fn test_single_brick_bits() {
        let mut brick = Brick::new([0, 0, 0], [0, 0, 0]);
        brick.color = BrickColor::Index(1);
        brick.collision = crate::save::Collision::all(false);
        let mut save = SaveData::with_bricks(vec![brick]);
        save.colors = vec![[0; 4], [255; 4]];

        let bytes = write_save(&save).unwrap();
        let (header1, _, _, bricks, _) = split(&bytes);
        assert_eq!(&header1[header1.len() - 4..], &[1, 0, 0, 0]);

        // asset (1 bit: 0), procedural (0), positions 3 x 8 bits of value 1,
        // orientation 16 in 5 bits, 4 collision bits, visibility, material
        // (5 entries: 3 bits), physical (1 bit), intensity (4 bits), color
        // flag + index (1 bit), owner 8 bits.
        let expected_bits = 1 + 1 + 24 + 5 + 4 + 1 + 3 + 1 + 4 + 1 + 1 + 8;
        assert_eq!(bricks.len(), (expected_bits + 7) / 8);
    }

    #[test]
    fn test_bricks_are_byte_aligned() {
        let save = SaveData::with_bricks(vec![Brick::default(), Brick::default()]);
        let bytes = write_save(&save).unwrap();
        let (_, _, _, bricks, _) = split(&bytes);

        let one = write_save(&SaveData::with_bricks(vec![Brick::default()])).unwrap();
        let (_, _, _, single, _) = split(&one);
        assert_eq!(bricks.len(), single.len() * 2);
        assert_eq!(&bricks[..single.len()], &single[..]);
    }

    #[test]
    fn test_preview_written() {
        let mut save = SaveData::default();
        save.preview = Some(Preview {
            format: PreviewFormat::Png,
            data: vec![0x89, b'P', b'N', b'G'],
        });
        let bytes = write_save(&save).unwrap();
        let needle = [1u8, 4, 0, 0, 0, 0x89, b'P', b'N', b'G'];
        assert!(bytes.windows(needle.len()).any(|w| w == needle));
    }

    #[test]
    fn test_palette_index_out_of_range() {
        let mut brick = Brick::default();
        brick.color = BrickColor::Index(5);
        let mut save = SaveData::with_bricks(vec![brick]);
        save.colors = vec![[0; 4]; 3];

        let result = write_save(&save);
        assert!(matches!(
            result,
            Err(Error::Encoding(EncodingError::ValueOutOfRange { value: 5, max: 3, .. }))
        ));
    }

    #[test]
    fn test_material_intensity_bound() {
        let mut brick = Brick::default();
        brick.material_intensity = 11;
        let result = write_save(&SaveData::with_bricks(vec![brick]));
        assert!(result.is_err());
    }

    fn light_schema() -> BTreeMap<String, ComponentSchema> {
        let mut components = BTreeMap::new();
        components.insert(
            "BCD_PointLight".to_string(),
            ComponentSchema {
                version: 1,
                properties: vec![
                    ComponentProperty {
                        name: "bEnabled".to_string(),
                        type_name: "Boolean".to_string(),
                    },
                    ComponentProperty {
                        name: "Radius".to_string(),
                        type_name: "Float".to_string(),
                    },
                ],
            },
        );
        components
    }

    #[test]
    fn test_components_section() {
        let mut lit = Brick::default();
        let mut values = BTreeMap::new();
        values.insert("bEnabled".to_string(), UnrealValue::Boolean(true));
        values.insert("Radius".to_string(), UnrealValue::Number(2.0));
        lit.components.insert("BCD_PointLight".to_string(), values);

        let mut save = SaveData::with_bricks(vec![Brick::default(), lit]);
        save.components = light_schema();

        let bytes = write_save(&save).unwrap();
        let (_, _, _, _, components) = split(&bytes);

        let mut cursor = ByteCursor::new(&components);
        assert_eq!(&*cursor.take(4, false).unwrap(), &[1, 0, 0, 0]);
        let name_len = "BCD_PointLight".len() + 1;
        cursor.take(4 + name_len, false).unwrap();

        let stream_len = i32::from_le_bytes(cursor.take(4, false).unwrap()[..].try_into().unwrap());
        assert_eq!(stream_len as usize, cursor.remaining());

        // version, then one brick index
        assert_eq!(&*cursor.take(4, false).unwrap(), &[1, 0, 0, 0]);
        assert_eq!(&*cursor.take(4, false).unwrap(), &[1, 0, 0, 0]);
    }

    #[test]
    fn test_component_missing_property() {
        let mut lit = Brick::default();
        let mut values = BTreeMap::new();
        values.insert("bEnabled".to_string(), UnrealValue::Boolean(true));
        lit.components.insert("BCD_PointLight".to_string(), values);

        let mut save = SaveData::with_bricks(vec![lit]);
        save.components = light_schema();

        assert!(matches!(
            write_save(&save),
            Err(Error::Encoding(EncodingError::MissingProperty { brick: 0, .. }))
        ));
    }
}
