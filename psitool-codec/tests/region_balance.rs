//! Nested write regions patch their length fields exactly like a two-pass
//! writer that records every field position and patches at the end.

use proptest::prelude::*;

use psitool_codec::buffer::PsiBuffer;

#[derive(Debug, Clone, Copy)]
enum Field {
    U8,
    U16,
    /// 4 reserved bits then a 12-bit length, as in DVB descriptor loops.
    Reserved4U12,
}

impl Field {
    fn max_length(self) -> usize {
        match self {
            Field::U8 => 0xFF,
            Field::U16 => 0xFFFF,
            Field::Reserved4U12 => 0x0FFF,
        }
    }
}

#[derive(Debug, Clone)]
enum Node {
    Data(Vec<u8>),
    Region { field: Field, children: Vec<Node> },
}

fn node() -> impl Strategy<Value = Node> {
    let leaf = prop::collection::vec(any::<u8>(), 0..24).prop_map(Node::Data);
    leaf.prop_recursive(4, 64, 6, |inner| {
        (
            prop_oneof![Just(Field::U8), Just(Field::U16), Just(Field::Reserved4U12)],
            prop::collection::vec(inner, 0..6),
        )
            .prop_map(|(field, children)| Node::Region { field, children })
    })
}

fn write_incremental(buf: &mut PsiBuffer, node: &Node) {
    match node {
        Node::Data(bytes) => buf.put_bytes(bytes),
        Node::Region { field, children } => {
            match field {
                Field::U8 => buf.push_write_region(8),
                Field::U16 => buf.push_write_region(16),
                Field::Reserved4U12 => {
                    buf.put_reserved(4);
                    buf.push_write_region(12);
                }
            }
            for child in children {
                write_incremental(buf, child);
            }
            buf.pop_write_region();
        }
    }
}

struct Patch {
    offset: usize,
    field: Field,
    body_start: usize,
    body_end: usize,
}

fn write_unpatched(out: &mut Vec<u8>, patches: &mut Vec<Patch>, node: &Node) {
    match node {
        Node::Data(bytes) => out.extend_from_slice(bytes),
        Node::Region { field, children } => {
            let offset = out.len();
            match field {
                Field::U8 => out.push(0),
                Field::U16 => out.extend_from_slice(&[0, 0]),
                Field::Reserved4U12 => out.extend_from_slice(&[0xF0, 0]),
            }
            let index = patches.len();
            patches.push(Patch {
                offset,
                field: *field,
                body_start: out.len(),
                body_end: 0,
            });
            for child in children {
                write_unpatched(out, patches, child);
            }
            patches[index].body_end = out.len();
        }
    }
}

/// Returns false when some length does not fit its field.
fn apply_patches(out: &mut [u8], patches: &[Patch]) -> bool {
    for patch in patches {
        let length = patch.body_end - patch.body_start;
        if length > patch.field.max_length() {
            return false;
        }
        match patch.field {
            Field::U8 => out[patch.offset] = length as u8,
            Field::U16 => out[patch.offset..patch.offset + 2].copy_from_slice(&(length as u16).to_be_bytes()),
            Field::Reserved4U12 => {
                out[patch.offset] = 0xF0 | (length >> 8) as u8;
                out[patch.offset + 1] = length as u8;
            }
        }
    }
    true
}

/// Walk the tree again through read regions, checking every leaf.
fn read_back(buf: &mut PsiBuffer, node: &Node) {
    match node {
        Node::Data(bytes) => assert_eq!(&buf.get_bytes(bytes.len()), bytes),
        Node::Region { field, children } => {
            match field {
                Field::U8 => buf.push_read_region(8),
                Field::U16 => buf.push_read_region(16),
                Field::Reserved4U12 => {
                    buf.skip_bits(4);
                    buf.push_read_region(12);
                }
            }
            for child in children {
                read_back(buf, child);
            }
            assert!(!buf.can_read());
            buf.pop_read_region();
        }
    }
}

proptest! {
    #[test]
    fn incremental_patching_matches_two_pass(nodes in prop::collection::vec(node(), 0..6)) {
        let mut buf = PsiBuffer::new(1 << 16);
        for node in &nodes {
            write_incremental(&mut buf, node);
        }
        prop_assert_eq!(buf.region_depth(), 0);

        let mut reference = Vec::new();
        let mut patches = Vec::new();
        for node in &nodes {
            write_unpatched(&mut reference, &mut patches, node);
        }
        if apply_patches(&mut reference, &patches) {
            prop_assert!(!buf.has_error());
            prop_assert_eq!(buf.as_written(), reference.as_slice());

            let mut input = PsiBuffer::from_bytes(&reference);
            for node in &nodes {
                read_back(&mut input, node);
            }
            prop_assert!(!input.has_error());
            prop_assert!(!input.can_read());
        } else {
            prop_assert!(buf.has_error());
        }
    }
}
