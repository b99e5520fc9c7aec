//! Structural dump and integrity checking.

use std::collections::HashSet;
use std::fmt::{self, Write as _};

use crate::node::{byte_at, nibble_value, Cell};
use crate::QpTrie;

impl<V> QpTrie<V> {
    /// Write a structural dump to `out`: one line per branch (cell
    /// address, tested index, flags) with a `twig` line per set bitmap
    /// bit, and one line per leaf (cell address, key pointer, printable
    /// key text, value pointer), indented by depth.
    pub fn dump(&self, out: &mut dyn fmt::Write) -> fmt::Result {
        writeln!(out, "qp trie len={}", self.len())?;
        if let Some(root) = &self.root {
            Self::dump_cell(root, 0, out)?;
        }
        Ok(())
    }

    fn dump_cell(cell: &Cell<V>, depth: usize, out: &mut dyn fmt::Write) -> fmt::Result {
        let pad = "  ".repeat(depth);
        if cell.is_branch() {
            writeln!(
                out,
                "{}branch {:p} index={} flags={}",
                pad,
                cell as *const Cell<V>,
                cell.index(),
                cell.flags()
            )?;
            for nibble in 0..16u16 {
                let bit = 1 << nibble;
                if cell.has_twig(bit) {
                    writeln!(out, "{}twig {:x}", pad, nibble)?;
                    let twig = unsafe { &cell.twigs()[cell.twig_offset(bit)] };
                    Self::dump_cell(twig, depth + 1, out)?;
                }
            }
        } else {
            writeln!(
                out,
                "{}leaf {:p} key {:p} {:?} val {:p}",
                pad,
                cell as *const Cell<V>,
                cell.key_ptr(),
                String::from_utf8_lossy(unsafe { cell.key() }),
                cell.value_ptr()
            )?;
        }
        Ok(())
    }

    /// Print the structural dump to stdout.
    pub fn debug_print(&self) {
        let mut s = String::new();
        let _ = self.dump(&mut s);
        print!("{}", s);
    }

    /// Walk the whole trie and describe every violated structural
    /// invariant. An intact trie returns an empty list.
    pub fn verify_integrity(&self) -> Vec<String> {
        let mut issues = Vec::new();
        let mut seen = HashSet::new();
        let mut leaves = 0usize;
        if let Some(root) = &self.root {
            Self::verify_cell(root, None, &mut Vec::new(), &mut seen, &mut leaves, &mut issues);
        }
        if leaves != self.len() {
            issues.push(format!(
                "walk found {} leaves but len() is {}",
                leaves,
                self.len()
            ));
        }
        issues
    }

    fn verify_cell(
        cell: &Cell<V>,
        parent_disc: Option<u64>,
        path: &mut Vec<(usize, u64, u8)>,
        seen: &mut HashSet<Vec<u8>>,
        leaves: &mut usize,
        issues: &mut Vec<String>,
    ) {
        if cell.is_branch() {
            let disc = cell.discriminant();
            if let Some(pd) = parent_disc {
                if disc <= pd {
                    issues.push(format!(
                        "branch discriminant {} does not increase past parent {}",
                        disc, pd
                    ));
                }
            }
            if cell.twigs_ptr().is_null() {
                issues.push(format!("branch at index {} has a null twig array", cell.index()));
                return;
            }
            let count = cell.twig_count();
            if count < 2 {
                issues.push(format!(
                    "branch at index {} flags={} has {} twig(s)",
                    cell.index(),
                    cell.flags(),
                    count
                ));
            }
            for nibble in 0..16u8 {
                let bit = 1 << nibble;
                if cell.has_twig(bit) {
                    path.push((cell.index(), cell.flags(), nibble));
                    let twig = unsafe { &cell.twigs()[cell.twig_offset(bit)] };
                    Self::verify_cell(twig, Some(disc), path, seen, leaves, issues);
                    path.pop();
                }
            }
        } else {
            if cell.key_ptr().is_null() || cell.value_ptr().is_null() {
                issues.push("leaf with a null key or value pointer".to_string());
                return;
            }
            // A leaf's value pointer doubles as the tag word; its low
            // bits clear is what made this cell read as a leaf at all.
            debug_assert_eq!(cell.value_ptr() as usize & 0b11, 0);

            let stored = unsafe { cell.key_bytes() };
            for &(index, flags, nibble) in path.iter() {
                let got = nibble_value(byte_at(stored, index), flags);
                if got != nibble {
                    issues.push(format!(
                        "leaf {:?} reached through nibble {:x} at index {} but its key reads {:x}",
                        String::from_utf8_lossy(unsafe { cell.key() }),
                        nibble,
                        index,
                        got
                    ));
                }
            }
            let key = unsafe { cell.key() }.to_vec();
            if !seen.insert(key.clone()) {
                issues.push(format!(
                    "duplicate key {:?}",
                    String::from_utf8_lossy(&key)
                ));
            }
            *leaves += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::QpTrie;

    /// Dump with heap addresses stripped, for shape comparison.
    fn shape(t: &QpTrie<u64>) -> String {
        let mut s = String::new();
        t.dump(&mut s).unwrap();
        s.lines()
            .map(|line| {
                line.split_whitespace()
                    .filter(|word| !word.starts_with("0x"))
                    .collect::<Vec<_>>()
                    .join(" ")
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    #[test]
    fn dump_empty() {
        let t: QpTrie<u64> = QpTrie::new();
        let mut s = String::new();
        t.dump(&mut s).unwrap();
        assert_eq!(s, "qp trie len=0\n");
    }

    #[test]
    fn dump_structure() {
        let mut t: QpTrie<u64> = QpTrie::new();
        t.insert(b"abc", 1);
        t.insert(b"abd", 2);
        let mut s = String::new();
        t.dump(&mut s).unwrap();
        assert!(s.starts_with("qp trie len=2\n"));
        assert!(s.contains("branch"));
        assert!(s.contains("index=2 flags=2"));
        assert!(s.contains("twig 3"));
        assert!(s.contains("twig 4"));
        assert!(s.contains("\"abc\""));
        assert!(s.contains("\"abd\""));
    }

    #[test]
    fn verify_clean_tries() {
        let mut t: QpTrie<u64> = QpTrie::new();
        assert!(t.verify_integrity().is_empty());

        for (i, key) in ["a", "ab", "abc", "b", "ba", "cafe", "caff", "d"]
            .iter()
            .enumerate()
        {
            t.insert(key.as_bytes(), i as u64);
            assert!(t.verify_integrity().is_empty(), "after inserting {}", key);
        }
        for key in ["ab", "cafe", "a"] {
            t.remove(key.as_bytes());
            assert!(t.verify_integrity().is_empty(), "after removing {}", key);
        }
    }

    #[test]
    fn insert_then_remove_restores_shape() {
        let mut t: QpTrie<u64> = QpTrie::new();
        for (i, key) in ["roman", "romane", "romanus", "romulus", "ruber", "rubicon"]
            .iter()
            .enumerate()
        {
            t.insert(key.as_bytes(), i as u64);
        }
        let before = shape(&t);

        assert_eq!(t.insert(b"rubens", 99), None);
        assert_eq!(t.remove(b"rubens"), Some(99));

        assert_eq!(shape(&t), before);
        assert!(t.verify_integrity().is_empty());
    }
}
