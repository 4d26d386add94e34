use std::fmt;

use crate::fragments::error::FragmentMapError;

/// Closed range of fragment indices `[index, index + count - 1]`
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct FragmentSection {
    pub index: u32,
    pub count: u32,
}

impl FragmentSection {
    pub fn new(index: u32, count: u32) -> Self {
        debug_assert!(count > 0, "FragmentSection must cover at least one fragment");
        Self { index, count }
    }

    pub fn last_index(&self) -> u32 {
        self.index + (self.count - 1)
    }

    /// One past the last index
    fn end(&self) -> u64 {
        u64::from(self.index) + u64::from(self.count)
    }

    pub fn contains(&self, index: u32) -> bool {
        index >= self.index && index <= self.last_index()
    }
}

impl fmt::Debug for FragmentSection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.index, self.last_index())
    }
}

/// Sparse set of fragment indices, stored as minimal sorted sections.
///
/// Sections never overlap and never touch: two bordering ranges are always
/// merged into one.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct FragmentMap {
    sections: Vec<FragmentSection>,
}

impl FragmentMap {
    pub fn new() -> Self {
        Self {
            sections: Vec::new(),
        }
    }

    /// A map holding the single section `[0, count)`
    pub fn with_range(count: u32) -> Self {
        let mut map = Self::new();
        if count > 0 {
            map.add(0, count);
        }
        map
    }

    pub fn sections(&self) -> &[FragmentSection] {
        &self.sections
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    pub fn clear(&mut self) {
        self.sections.clear();
    }

    /// Whether the map is exactly `[0, count)`
    pub fn covers(&self, count: u32) -> bool {
        match self.sections.as_slice() {
            [only] => only.index == 0 && only.count == count,
            _ => false,
        }
    }

    pub fn contains(&self, index: u32) -> bool {
        self.section_position(index).is_some()
    }

    pub fn fragment_count(&self) -> u64 {
        self.sections.iter().map(|s| u64::from(s.count)).sum()
    }

    /// Sub-ranges of `[index, index + count)` that are not yet in the map
    pub fn gaps(&self, index: u32, count: u32) -> Vec<FragmentSection> {
        let mut output = Vec::new();
        if count == 0 {
            return output;
        }
        let end = u64::from(index) + u64::from(count);
        let mut cursor = u64::from(index);

        let start = self.sections.partition_point(|s| s.end() <= cursor);
        for section in &self.sections[start..] {
            if cursor >= end {
                break;
            }
            let section_start = u64::from(section.index);
            if section_start >= end {
                break;
            }
            if section_start > cursor {
                output.push(FragmentSection::new(cursor as u32, (section_start - cursor) as u32));
            }
            cursor = cursor.max(section.end());
        }
        if cursor < end {
            output.push(FragmentSection::new(cursor as u32, (end - cursor) as u32));
        }
        output
    }

    /// Adds `[index, index + count)`, merging with bordering sections
    pub fn try_add(&mut self, index: u32, count: u32) -> Result<(), FragmentMapError> {
        if count == 0 {
            return Err(FragmentMapError::ZeroCount);
        }
        let end = u64::from(index) + u64::from(count);
        if end > u64::from(u32::MAX) + 1 {
            return Err(FragmentMapError::RangeOverflow { index, count });
        }

        // first section starting after `index`
        let next_position = self.sections.partition_point(|s| s.index <= index);

        if next_position > 0 {
            let previous = self.sections[next_position - 1];
            if previous.end() > u64::from(index) {
                return Err(FragmentMapError::Overlap { index, count });
            }
        }
        if let Some(next) = self.sections.get(next_position) {
            if u64::from(next.index) < end {
                return Err(FragmentMapError::Overlap { index, count });
            }
        }

        let merges_previous =
            next_position > 0 && self.sections[next_position - 1].end() == u64::from(index);
        let position = if merges_previous {
            self.sections[next_position - 1].count += count;
            next_position - 1
        } else {
            self.sections
                .insert(next_position, FragmentSection::new(index, count));
            next_position
        };

        // the grown section may now border the one after it
        if let Some(following) = self.sections.get(position + 1).copied() {
            if self.sections[position].end() == u64::from(following.index) {
                self.sections[position].count += following.count;
                self.sections.remove(position + 1);
            }
        }

        self.assert_sections();
        Ok(())
    }

    /// Adds `[index, index + count)`.
    ///
    /// # Panics
    ///
    /// Panics if `count` is zero or the range overlaps an existing section.
    pub fn add(&mut self, index: u32, count: u32) {
        self.try_add(index, count)
            .unwrap_or_else(|e| panic!("FragmentMap error: {}", e))
    }

    pub fn add_section(&mut self, section: FragmentSection) {
        self.add(section.index, section.count);
    }

    /// Removes `[index, index + count)`, which must lie within a single section
    pub fn try_remove(&mut self, index: u32, count: u32) -> Result<(), FragmentMapError> {
        if count == 0 {
            return Err(FragmentMapError::ZeroCount);
        }
        let end = u64::from(index) + u64::from(count);

        let Some(position) = self.section_position(index) else {
            return Err(FragmentMapError::NotFound { index, count });
        };
        let section = self.sections[position];
        if end > section.end() {
            return Err(FragmentMapError::NotFound { index, count });
        }

        if index == section.index {
            if count == section.count {
                self.sections.remove(position);
            } else {
                let shrunk = &mut self.sections[position];
                shrunk.index += count;
                shrunk.count -= count;
            }
        } else if end == section.end() {
            self.sections[position].count -= count;
        } else {
            let head_count = index - section.index;
            let tail_index = index + count;
            let tail_count = (section.end() - end) as u32;
            self.sections[position].count = head_count;
            self.sections
                .insert(position + 1, FragmentSection::new(tail_index, tail_count));
        }

        self.assert_sections();
        Ok(())
    }

    /// Removes `[index, index + count)`.
    ///
    /// # Panics
    ///
    /// Panics if `count` is zero or no single section fully contains the range.
    pub fn remove(&mut self, index: u32, count: u32) {
        self.try_remove(index, count)
            .unwrap_or_else(|e| panic!("FragmentMap error: {}", e))
    }

    pub fn remove_section(&mut self, section: FragmentSection) {
        self.remove(section.index, section.count);
    }

    fn section_position(&self, index: u32) -> Option<usize> {
        let next_position = self.sections.partition_point(|s| s.index <= index);
        if next_position == 0 {
            return None;
        }
        let position = next_position - 1;
        if self.sections[position].contains(index) {
            Some(position)
        } else {
            None
        }
    }

    /// Sections are strictly ascending, non-empty, and neither overlap nor border
    pub fn sections_are_valid(&self) -> bool {
        sections_are_valid(&self.sections)
    }

    fn assert_sections(&self) {
        check_sections(&self.sections);
    }
}

fn sections_are_valid(sections: &[FragmentSection]) -> bool {
    if sections.iter().any(|s| s.count == 0) {
        return false;
    }
    sections
        .windows(2)
        .all(|pair| pair[0].end() < u64::from(pair[1].index))
}

cfg_if! {
    if #[cfg(any(debug_assertions, feature = "invariant_checks"))] {
        fn check_sections(sections: &[FragmentSection]) {
            assert!(
                sections_are_valid(sections),
                "FragmentMap invariant violated: {:?}",
                sections
            );
        }
    } else {
        fn check_sections(_sections: &[FragmentSection]) {}
    }
}

impl fmt::Debug for FragmentMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.sections.iter()).finish()
    }
}
