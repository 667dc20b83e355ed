//! Binary level data.
//!
//! Little-endian, in this order: planes, nodes, portals, leaves, visibility.
//! Every section starts with a `u32` element count; the visibility section
//! starts with its byte size followed by a one-byte compressed flag. Child
//! references use the encoding of [`Child::encode`].

use std::io::{Read, Write};

use byteorder::{ReadBytesExt, WriteBytesExt, LE};
use log::debug;
use nalgebra::{Point3, Vector3};

use crate::bsp::{BspLeaf, BspNode, BspPortal, BspTree, Child, PvsData};
use crate::error::{CompileError, Result};
use crate::{BoundingBox, Plane3D, Polygon};

/// Level data read back from its binary form.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LevelData {
    pub planes: Vec<Plane3D>,
    pub nodes: Vec<BspNode>,
    pub portals: Vec<BspPortal>,
    pub leaves: Vec<BspLeaf>,
    pub pvs: PvsData,
}

fn write_count<W: Write>(out: &mut W, count: usize) -> Result<()> {
    let count = u32::try_from(count)
        .map_err(|_| CompileError::InvalidTreeData("section exceeds u32 range".into()))?;
    out.write_u32::<LE>(count)?;
    Ok(())
}

fn write_index<W: Write>(out: &mut W, index: usize) -> Result<()> {
    write_count(out, index)
}

fn write_bounds<W: Write>(out: &mut W, bounds: &BoundingBox) -> Result<()> {
    for value in bounds.to_array() {
        out.write_f32::<LE>(value)?;
    }
    Ok(())
}

fn read_bounds<R: Read>(input: &mut R) -> Result<BoundingBox> {
    let mut values = [0.0; 6];
    for value in &mut values {
        *value = input.read_f32::<LE>()?;
    }
    Ok(BoundingBox::from_array(values))
}

fn read_index<R: Read>(input: &mut R) -> Result<usize> {
    Ok(input.read_u32::<LE>()? as usize)
}

fn read_point<R: Read>(input: &mut R) -> Result<Point3<f32>> {
    Ok(Point3::new(
        input.read_f32::<LE>()?,
        input.read_f32::<LE>()?,
        input.read_f32::<LE>()?,
    ))
}

/// Writes the compiled arrays of `tree`.
pub fn write_level_data<W: Write>(tree: &BspTree, mut out: W) -> Result<()> {
    write_count(&mut out, tree.planes().len())?;
    for plane in tree.planes() {
        let normal = plane.normal();
        out.write_f32::<LE>(normal.x)?;
        out.write_f32::<LE>(normal.y)?;
        out.write_f32::<LE>(normal.z)?;
        out.write_f32::<LE>(plane.offset())?;
    }

    write_count(&mut out, tree.nodes().len())?;
    for node in tree.nodes() {
        write_index(&mut out, node.plane)?;
        write_bounds(&mut out, &node.bounds)?;
        out.write_u32::<LE>(node.front.encode())?;
        out.write_u32::<LE>(node.back.encode())?;
    }

    write_count(&mut out, tree.portals().len())?;
    for portal in tree.portals() {
        write_index(&mut out, portal.owner_node)?;
        write_index(&mut out, portal.front_leaf())?;
        write_index(&mut out, portal.back_leaf())?;
        write_count(&mut out, portal.polygon.len())?;
        for point in portal.polygon.points() {
            out.write_f32::<LE>(point.x)?;
            out.write_f32::<LE>(point.y)?;
            out.write_f32::<LE>(point.z)?;
        }
    }

    write_count(&mut out, tree.leaves().len())?;
    for leaf in tree.leaves() {
        write_bounds(&mut out, &leaf.bounds)?;
        out.write_u32::<LE>(leaf.pvs_offset)?;
        write_count(&mut out, leaf.faces.len())?;
        write_count(&mut out, leaf.portals.len())?;
        for &face in &leaf.faces {
            write_index(&mut out, face)?;
        }
        for &portal in &leaf.portals {
            write_index(&mut out, portal)?;
        }
    }

    let pvs = tree.pvs();
    write_count(&mut out, pvs.data.len())?;
    out.write_u8(u8::from(pvs.compressed))?;
    out.write_all(&pvs.data)?;
    out.flush()?;

    debug!(
        "wrote level data: {} planes, {} nodes, {} portals, {} leaves, {} pvs bytes",
        tree.planes().len(),
        tree.nodes().len(),
        tree.portals().len(),
        tree.leaves().len(),
        pvs.data.len()
    );
    Ok(())
}

/// Reads data written by [`write_level_data`].
pub fn read_level_data<R: Read>(mut input: R) -> Result<LevelData> {
    let mut level = LevelData::default();

    let count = read_index(&mut input)?;
    for index in 0..count {
        let normal = Vector3::new(
            input.read_f32::<LE>()?,
            input.read_f32::<LE>()?,
            input.read_f32::<LE>()?,
        );
        let offset = input.read_f32::<LE>()?;
        let plane = Plane3D::new(normal, offset)
            .ok_or_else(|| CompileError::InvalidTreeData(format!("plane {index} has no normal")))?;
        level.planes.push(plane);
    }

    let count = read_index(&mut input)?;
    for index in 0..count {
        let plane = read_index(&mut input)?;
        if plane >= level.planes.len() {
            return Err(CompileError::InvalidTreeData(format!(
                "node {index} references missing plane {plane}"
            )));
        }
        let bounds = read_bounds(&mut input)?;
        let mut node = BspNode::new(plane, bounds);
        node.front = Child::decode(input.read_u32::<LE>()?);
        node.back = Child::decode(input.read_u32::<LE>()?);
        level.nodes.push(node);
    }

    let count = read_index(&mut input)?;
    for _ in 0..count {
        let owner_node = read_index(&mut input)?;
        let leaf_owner = [read_index(&mut input)?, read_index(&mut input)?];
        let points = read_index(&mut input)?;
        let mut polygon = Vec::new();
        for _ in 0..points {
            polygon.push(read_point(&mut input)?);
        }
        level.portals.push(BspPortal {
            polygon: Polygon::from_points(polygon),
            owner_node,
            leaf_owner,
        });
    }

    let count = read_index(&mut input)?;
    for _ in 0..count {
        let bounds = read_bounds(&mut input)?;
        let pvs_offset = input.read_u32::<LE>()?;
        let faces = read_index(&mut input)?;
        let portals = read_index(&mut input)?;
        let mut leaf = BspLeaf {
            bounds,
            pvs_offset,
            ..BspLeaf::default()
        };
        for _ in 0..faces {
            leaf.faces.push(read_index(&mut input)?);
        }
        for _ in 0..portals {
            leaf.portals.push(read_index(&mut input)?);
        }
        level.leaves.push(leaf);
    }

    let size = read_index(&mut input)?;
    level.pvs.compressed = input.read_u8()? != 0;
    let mut data = Vec::new();
    input.take(size as u64).read_to_end(&mut data)?;
    if data.len() != size {
        return Err(CompileError::InvalidTreeData(format!(
            "visibility data truncated: {} of {size} bytes",
            data.len()
        )));
    }
    level.pvs.data = data;

    Ok(level)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{compile, rooms_in_a_row};
    use crate::options::{BspOptions, PvsOptions};
    use crate::portals::PortalCompiler;
    use crate::progress::{NeverCancel, PhaseContext};
    use crate::pvs::PvsCompiler;
    use assert_approx_eq::assert_approx_eq;

    fn compiled_rooms() -> BspTree {
        let mut tree = compile(rooms_in_a_row(3), &BspOptions::default());
        let mut ctx = PhaseContext::new(&NeverCancel);
        PortalCompiler::default().compile(&mut tree, &mut ctx).unwrap();
        PvsCompiler::new(PvsOptions::default()).compile(&mut tree, &mut ctx).unwrap();
        tree
    }

    #[test]
    fn level_data_reads_back() {
        let tree = compiled_rooms();
        let mut bytes = Vec::new();
        write_level_data(&tree, &mut bytes).unwrap();
        let level = read_level_data(bytes.as_slice()).unwrap();

        assert_eq!(level.planes.len(), tree.planes().len());
        for (read, written) in level.planes.iter().zip(tree.planes()) {
            assert!(read.approx_eq(written));
        }
        assert_eq!(level.nodes, tree.nodes());
        assert_eq!(level.leaves, tree.leaves());
        assert_eq!(level.pvs, *tree.pvs());

        assert_eq!(level.portals.len(), tree.portals().len());
        for (read, written) in level.portals.iter().zip(tree.portals()) {
            assert_eq!(read.leaf_owner, written.leaf_owner);
            assert_eq!(read.owner_node, written.owner_node);
            assert_approx_eq!(read.polygon.area(), written.polygon.area());
        }
    }

    #[test]
    fn sections_start_with_plane_count() {
        let tree = compiled_rooms();
        let mut bytes = Vec::new();
        write_level_data(&tree, &mut bytes).unwrap();
        let planes = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        assert_eq!(planes as usize, tree.planes().len());
        // The visibility blob ends the file.
        let pvs = &tree.pvs().data;
        assert_eq!(&bytes[bytes.len() - pvs.len()..], pvs.as_slice());
    }

    #[test]
    fn truncated_data_is_rejected() {
        let tree = compiled_rooms();
        let mut bytes = Vec::new();
        write_level_data(&tree, &mut bytes).unwrap();
        bytes.truncate(bytes.len() - 1);
        assert!(read_level_data(bytes.as_slice()).is_err());
    }

    #[test]
    fn dangling_plane_index_is_rejected() {
        let mut bytes = Vec::new();
        bytes.write_u32::<LE>(0).unwrap();
        bytes.write_u32::<LE>(1).unwrap();
        bytes.write_u32::<LE>(3).unwrap();
        let err = read_level_data(bytes.as_slice()).unwrap_err();
        assert!(matches!(err, CompileError::InvalidTreeData(_)));
    }
}
