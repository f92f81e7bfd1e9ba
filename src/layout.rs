use crate::blocks::{BlockId, BlockMap};
use crate::catalog;
use std::collections::{HashMap, HashSet};

const BLOCK_BASE_WIDTH: i64 = 220;
const BLOCK_BASE_HEIGHT: i64 = 40;
const LABEL_CHAR_WIDTH: i64 = 6;
const STACK_GAP: i64 = 12;
const BRANCH_GAP: i64 = 12;
const CLAUSE_GAP: i64 = 16;
const BRANCH_INDENT: i64 = 28;
const GAP_X: i64 = 80;
const GAP_Y: i64 = 40;
const TARGET_RATIO: f64 = 0.5;
const RATIO_WEIGHT: f64 = 2.5;
// C-block end caps are thin; the raw sum underestimates them.
const BRACKET_HEIGHT_SCALE: f64 = 1.66;
const MAX_COLUMNS: usize = 5;
const ORIGIN: i64 = 40;

type Size = (i64, i64);

struct StackInfo {
    id: BlockId,
    width: i64,
    height: i64,
    order: usize,
}

/// Memoised footprint estimates for one block arena.
struct Sizer<'a> {
    blocks: &'a BlockMap,
    block_cache: HashMap<BlockId, Size>,
    stack_cache: HashMap<BlockId, Size>,
}

impl<'a> Sizer<'a> {
    fn new(blocks: &'a BlockMap) -> Self {
        Self {
            blocks,
            block_cache: HashMap::new(),
            stack_cache: HashMap::new(),
        }
    }

    fn label_width(&self, id: &BlockId) -> i64 {
        let opcode = self.blocks.get(id).map(|b| b.opcode.as_str()).unwrap_or("");
        let label_len = match catalog::template(opcode) {
            Some(tpl) => tpl.label().chars().count(),
            None => opcode.chars().count(),
        };
        BLOCK_BASE_WIDTH.max(LABEL_CHAR_WIDTH * label_len as i64 + 80)
    }

    fn block_size(&mut self, id: &BlockId) -> Size {
        if let Some(size) = self.block_cache.get(id) {
            return *size;
        }
        // Placeholder while measuring, so a branch that loops back to its owner stops here.
        self.block_cache
            .insert(id.clone(), (BLOCK_BASE_WIDTH, BLOCK_BASE_HEIGHT));

        let mut width = self.label_width(id);
        let mut height = BLOCK_BASE_HEIGHT;
        let Some(block) = self.blocks.get(id) else {
            return (width, height);
        };

        if let Some(first) = block.input_block("SUBSTACK") {
            let (child_w, child_h) = self.stack_size(first);
            width = width.max(child_w + BRANCH_INDENT);
            height += BRANCH_GAP + child_h;
        }
        if let Some(first) = block.input_block("SUBSTACK2") {
            let (child_w, child_h) = self.stack_size(first);
            width = width.max(child_w + BRANCH_INDENT);
            height += CLAUSE_GAP + child_h;
        }
        if catalog::is_control_block(&block.opcode) {
            height = (height as f64 * BRACKET_HEIGHT_SCALE) as i64;
        }

        self.block_cache.insert(id.clone(), (width, height));
        (width, height)
    }

    fn stack_size(&mut self, start: &BlockId) -> Size {
        if let Some(size) = self.stack_cache.get(start) {
            return *size;
        }
        let mut total_height = 0;
        let mut max_width = 0;
        let mut visited = HashSet::new();
        let mut current = Some(start.clone());
        while let Some(id) = current {
            if !visited.insert(id.clone()) {
                break;
            }
            let (w, h) = self.block_size(&id);
            total_height += h;
            max_width = max_width.max(w);
            current = self.blocks.get(&id).and_then(|b| b.next.clone());
            if current.is_some() {
                total_height += STACK_GAP;
            }
        }
        self.stack_cache.insert(start.clone(), (max_width, total_height));
        (max_width, total_height)
    }
}

struct Arrangement {
    score: f64,
    columns: Vec<Vec<usize>>,
    widths: Vec<i64>,
}

fn pack(stacks: &[StackInfo], cols: usize) -> Arrangement {
    let script_gap = GAP_Y * 3;
    let script_gap_x = GAP_X * 3;
    let mut columns: Vec<Vec<usize>> = vec![Vec::new(); cols];
    let mut heights = vec![0i64; cols];

    let mut by_height: Vec<usize> = (0..stacks.len()).collect();
    by_height.sort_by(|a, b| stacks[*b].height.cmp(&stacks[*a].height));
    for idx in by_height {
        let mut target = 0;
        for col in 1..cols {
            if heights[col] < heights[target] {
                target = col;
            }
        }
        if !columns[target].is_empty() {
            heights[target] += script_gap;
        }
        heights[target] += stacks[idx].height;
        columns[target].push(idx);
    }

    let widths: Vec<i64> = columns
        .iter()
        .map(|col| col.iter().map(|&i| stacks[i].width).max().unwrap_or(0))
        .collect();
    let total_width = widths.iter().sum::<i64>() + script_gap_x * (cols as i64 - 1);
    let total_height = heights.iter().copied().max().unwrap_or(0);
    let ratio = if total_height > 0 {
        total_width as f64 / total_height as f64
    } else {
        1.0
    };
    let area = (total_width * total_height) as f64;
    Arrangement {
        score: area * (1.0 + RATIO_WEIGHT * (ratio - TARGET_RATIO).abs()),
        columns,
        widths,
    }
}

/// Reposition every top-level stack into 1 to 5 roughly balanced columns.
///
/// Deterministic for a given arena: stacks keep their original relative
/// order inside the column they land in.
pub fn auto_arrange(blocks: &mut BlockMap) {
    let heads = blocks.top_level_ids();
    if heads.is_empty() {
        return;
    }

    let stacks: Vec<StackInfo> = {
        let mut sizer = Sizer::new(blocks);
        heads
            .into_iter()
            .enumerate()
            .map(|(order, id)| {
                let (width, height) = sizer.stack_size(&id);
                StackInfo {
                    id,
                    width,
                    height,
                    order,
                }
            })
            .collect()
    };

    let max_cols = stacks.len().clamp(1, MAX_COLUMNS);
    let mut best: Option<Arrangement> = None;
    for cols in 1..=max_cols {
        let candidate = pack(&stacks, cols);
        if best.as_ref().map_or(true, |b| candidate.score < b.score) {
            best = Some(candidate);
        }
    }
    let Some(best) = best else {
        return;
    };

    let mut x = ORIGIN;
    for (column, width) in best.columns.iter().zip(&best.widths) {
        let mut members = column.clone();
        members.sort_by_key(|&i| stacks[i].order);
        let mut y = ORIGIN;
        for idx in members {
            if let Some(block) = blocks.get_mut(&stacks[idx].id) {
                block.position = Some((x, y));
            }
            y += stacks[idx].height + GAP_Y * 3;
        }
        x += width + GAP_X * 3;
    }
    tracing::debug!("arranged {} stacks into {} columns", stacks.len(), best.columns.len());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blocks::{Block, Input, Slot};

    fn put_head(map: &mut BlockMap, id: &str, opcode: &str) {
        let mut block = Block::new(opcode, None);
        block.top_level = true;
        block.position = Some((0, 0));
        map.insert(BlockId::from(id), block);
    }

    #[test]
    fn bracket_blocks_grow_with_their_body() {
        let mut map = BlockMap::new();
        put_head(&mut map, "loop", "control_forever");
        map.get_mut(&BlockId::from("loop"))
            .unwrap()
            .inputs
            .insert("SUBSTACK".into(), Input::NoShadow(Slot::Block("body".into())));
        map.insert(BlockId::from("body"), Block::new("looks_show", Some("loop".into())));

        let mut sizer = Sizer::new(&map);
        assert_eq!(sizer.block_size(&BlockId::from("body")), (220, 40));
        // (40 + 12 + 40) * 1.66
        assert_eq!(sizer.block_size(&BlockId::from("loop")), (248, 152));
    }

    #[test]
    fn long_labels_widen_blocks() {
        let mut map = BlockMap::new();
        put_head(&mut map, "a", "sensing_setdragmode");
        let label = catalog::template("sensing_setdragmode").unwrap().label();
        let expected = (6 * label.chars().count() as i64 + 80).max(220);
        assert_eq!(Sizer::new(&map).block_size(&BlockId::from("a")).0, expected);
    }

    #[test]
    fn small_projects_stack_in_one_column() {
        let mut map = BlockMap::new();
        put_head(&mut map, "a", "looks_show");
        put_head(&mut map, "b", "looks_hide");
        auto_arrange(&mut map);
        assert_eq!(map.get(&BlockId::from("a")).unwrap().position, Some((40, 40)));
        assert_eq!(map.get(&BlockId::from("b")).unwrap().position, Some((40, 200)));
    }

    #[test]
    fn arrangement_is_deterministic() {
        let build = || {
            let mut map = BlockMap::new();
            for i in 0..9 {
                put_head(&mut map, &format!("s{}", i), "looks_show");
            }
            map
        };
        let mut first = build();
        let mut second = build();
        auto_arrange(&mut first);
        auto_arrange(&mut second);
        assert_eq!(first, second);
        let spots: HashSet<(i64, i64)> = first.iter().filter_map(|(_, b)| b.position).collect();
        assert_eq!(spots.len(), 9);
    }

    #[test]
    fn self_referencing_stacks_terminate() {
        let mut map = BlockMap::new();
        put_head(&mut map, "a", "control_forever");
        let a = map.get_mut(&BlockId::from("a")).unwrap();
        a.inputs
            .insert("SUBSTACK".into(), Input::NoShadow(Slot::Block("a".into())));
        a.next = Some("a".into());
        auto_arrange(&mut map);
        assert_eq!(map.get(&BlockId::from("a")).unwrap().position, Some((40, 40)));
    }
}
