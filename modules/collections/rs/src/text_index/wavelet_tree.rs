use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::io::{self, Read, Write};

use simple_sds::bit_vector::BitVector;
use simple_sds::int_vector::IntVector;
use simple_sds::ops::{Access, BitVec, Rank, Vector};
use simple_sds::raw_vector::{PushRaw, RawVector};
use simple_sds::serialize::Serialize;

use super::{invalid_data, read_u64, write_u64};

#[derive(Clone, Copy, Debug)]
enum Node {
    Leaf(usize),
    // Bitvector of the node and the children taking the 0 and 1 branches
    Inner { bits: usize, children: [usize; 2] },
}

/// Huffman-shaped wavelet tree over a sequence of small integer symbols.
///
/// Frequent symbols sit close to the root, so the bitvectors take about as many bits as the
/// zero-order entropy of the sequence. Only the tree shape and the bitvectors are stored, symbol
/// frequencies and code paths are recovered on load.
#[derive(Clone, Debug)]
pub(crate) struct WaveletTree {
    len: usize,
    // Preorder shape: 0 for an inner node, symbol + 1 for a leaf
    shape: IntVector,
    bits: Vec<BitVector>,
    nodes: Vec<Node>,
    // Root to leaf branches of every symbol as (bitvector, bit) pairs
    paths: Vec<Vec<(usize, bool)>>,
    counts: Vec<usize>,
}

impl WaveletTree {
    /// Index a sequence of symbols from `0..sigma`.
    pub fn build(seq: &[u16], sigma: usize) -> io::Result<Self> {
        let mut freqs = vec![0usize; sigma];
        for &symbol in seq {
            let symbol = symbol as usize;
            if symbol >= sigma {
                return Err(invalid_data(format!(
                    "Symbol {} is outside of the alphabet of size {}",
                    symbol, sigma
                )));
            }
            freqs[symbol] += 1;
        }
        let shape = huffman_shape(&freqs)?;
        let (nodes, inner) = decode_shape(&shape, sigma)?;
        let paths = symbol_paths(&nodes, sigma);

        let mut raw = (0..inner).map(|_| RawVector::new()).collect::<Vec<_>>();
        for &symbol in seq {
            for &(bits, bit) in &paths[symbol as usize] {
                raw[bits].push_bit(bit);
            }
        }
        let bits = raw
            .into_iter()
            .map(|raw| {
                let mut bv = BitVector::from(raw);
                bv.enable_rank();
                bv
            })
            .collect();

        Self::assemble(seq.len(), shape, bits, nodes, paths, sigma)
    }

    // Check that every node holds as many bits as its parent routes to it and count the symbols
    fn assemble(
        len: usize,
        shape: IntVector,
        bits: Vec<BitVector>,
        nodes: Vec<Node>,
        paths: Vec<Vec<(usize, bool)>>,
        sigma: usize,
    ) -> io::Result<Self> {
        let mut counts = vec![0usize; sigma];
        // Nodes are in preorder, so a parent always comes before its children
        let mut lengths = vec![0usize; nodes.len()];
        lengths[0] = len;
        for (ind, node) in nodes.iter().enumerate() {
            match *node {
                Node::Leaf(symbol) => counts[symbol] = lengths[ind],
                Node::Inner { bits: bv, children } => {
                    let bv = &bits[bv];
                    if bv.len() != lengths[ind] {
                        return Err(invalid_data(format!(
                            "Wavelet tree node {} holds {} bits instead of {}",
                            ind,
                            bv.len(),
                            lengths[ind]
                        )));
                    }
                    lengths[children[0]] = bv.count_zeros();
                    lengths[children[1]] = bv.count_ones();
                }
            }
        }

        Ok(Self {
            len,
            shape,
            bits,
            nodes,
            paths,
            counts,
        })
    }

    pub fn len(&self) -> usize {
        self.len
    }

    /// Number of occurrences of the symbol in the whole sequence.
    pub fn count(&self, symbol: usize) -> usize {
        self.counts.get(symbol).copied().unwrap_or(0)
    }

    /// Occurrences of the symbol in `seq[0..index]`.
    pub fn rank(&self, symbol: usize, index: usize) -> usize {
        if self.count(symbol) == 0 {
            return 0;
        }
        let mut index = index.min(self.len);
        for &(bits, bit) in &self.paths[symbol] {
            let ones = self.bits[bits].rank(index);
            index = if bit { ones } else { index - ones };
        }
        index
    }

    /// Symbol at the index and the number of its occurrences before it.
    pub fn access_rank(&self, index: usize) -> (usize, usize) {
        debug_assert!(index < self.len);
        let (mut node, mut index) = (0, index);
        loop {
            match self.nodes[node] {
                Node::Leaf(symbol) => return (symbol, index),
                Node::Inner { bits, children } => {
                    let bv = &self.bits[bits];
                    let bit = bv.get(index);
                    let ones = bv.rank(index);
                    index = if bit { ones } else { index - ones };
                    node = children[bit as usize];
                }
            }
        }
    }

    pub fn get(&self, index: usize) -> usize {
        self.access_rank(index).0
    }

    pub fn serialize<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        write_u64(writer, self.len as u64)?;
        self.shape.serialize(writer)?;
        for bv in &self.bits {
            bv.serialize(writer)?;
        }
        Ok(())
    }

    pub fn load<R: Read>(reader: &mut R, sigma: usize) -> io::Result<Self> {
        let len = usize::try_from(read_u64(reader)?)
            .map_err(|_| invalid_data("Wavelet tree length doesn't fit in memory"))?;
        let shape = IntVector::load(reader)?;
        let (nodes, inner) = decode_shape(&shape, sigma)?;
        let paths = symbol_paths(&nodes, sigma);

        let mut bits = Vec::with_capacity(inner);
        for _ in 0..inner {
            let mut bv = BitVector::load(reader)?;
            if !bv.supports_rank() {
                bv.enable_rank();
            }
            bits.push(bv);
        }
        Self::assemble(len, shape, bits, nodes, paths, sigma)
    }

    pub fn size_in_bytes(&self) -> usize {
        8 + self.shape.size_in_bytes()
            + self.bits.iter().map(|bv| bv.size_in_bytes()).sum::<usize>()
    }
}

// Preorder shape of the Huffman tree for the given frequencies
fn huffman_shape(freqs: &[usize]) -> io::Result<IntVector> {
    enum Draft {
        Leaf(usize),
        Inner([usize; 2]),
    }

    let mut drafts = Vec::new();
    let mut heap = BinaryHeap::new();
    for (symbol, &freq) in freqs.iter().enumerate() {
        if freq > 0 {
            heap.push(Reverse((freq, drafts.len())));
            drafts.push(Draft::Leaf(symbol));
        }
    }
    if drafts.is_empty() {
        drafts.push(Draft::Leaf(0));
    }
    while heap.len() > 1 {
        if let (Some(Reverse((w0, left))), Some(Reverse((w1, right)))) = (heap.pop(), heap.pop()) {
            heap.push(Reverse((w0 + w1, drafts.len())));
            drafts.push(Draft::Inner([left, right]));
        }
    }
    let root = heap.pop().map_or(0, |Reverse((_, ind))| ind);

    let mut shape = Vec::with_capacity(drafts.len());
    let mut stack = vec![root];
    while let Some(ind) = stack.pop() {
        match drafts[ind] {
            Draft::Leaf(symbol) => shape.push(symbol as u64 + 1),
            Draft::Inner([left, right]) => {
                shape.push(0);
                stack.push(right);
                stack.push(left);
            }
        }
    }

    let width = (64 - (freqs.len() as u64).leading_zeros() as usize).max(1);
    let mut packed = IntVector::with_len(shape.len(), width, 0).map_err(invalid_data)?;
    for (ind, value) in shape.into_iter().enumerate() {
        packed.set(ind, value);
    }
    Ok(packed)
}

// Nodes of a preorder shape and the number of inner nodes among them
fn decode_shape(shape: &IntVector, sigma: usize) -> io::Result<(Vec<Node>, usize)> {
    if shape.is_empty() || shape.len() > 2 * sigma.max(1) || shape.width() > 64 {
        return Err(invalid_data(format!(
            "Wavelet tree shape of {} nodes for an alphabet of {}",
            shape.len(),
            sigma
        )));
    }

    let mut nodes = Vec::with_capacity(shape.len());
    let mut seen = vec![false; sigma];
    let mut inner = 0;
    // Inner nodes still missing a child, with the number of children attached so far
    let mut open: Vec<(usize, usize)> = Vec::new();
    for (ind, value) in shape.iter().enumerate() {
        let node = match value as usize {
            0 => {
                inner += 1;
                Node::Inner {
                    bits: inner - 1,
                    children: [0, 0],
                }
            }
            leaf if leaf <= sigma && !seen[leaf - 1] => {
                seen[leaf - 1] = true;
                Node::Leaf(leaf - 1)
            }
            leaf => {
                return Err(invalid_data(format!(
                    "Invalid or repeated wavelet tree leaf {}",
                    leaf - 1
                )))
            }
        };
        nodes.push(node);

        if ind > 0 {
            let Some((parent, filled)) = open.last_mut() else {
                return Err(invalid_data("Wavelet tree shape continues past its root"));
            };
            if let Node::Inner { children, .. } = &mut nodes[*parent] {
                children[*filled] = ind;
            }
            *filled += 1;
            if *filled == 2 {
                open.pop();
            }
        }
        if let Node::Inner { .. } = node {
            open.push((ind, 0));
        }
    }
    if !open.is_empty() {
        return Err(invalid_data("Wavelet tree shape is truncated"));
    }
    Ok((nodes, inner))
}

fn symbol_paths(nodes: &[Node], sigma: usize) -> Vec<Vec<(usize, bool)>> {
    let mut paths = vec![Vec::new(); sigma];
    let mut stack = vec![(0, Vec::new())];
    while let Some((ind, path)) = stack.pop() {
        match nodes[ind] {
            Node::Leaf(symbol) => paths[symbol] = path,
            Node::Inner { bits, children } => {
                for (bit, child) in [(false, children[0]), (true, children[1])] {
                    let mut branch = path.clone();
                    branch.push((bits, bit));
                    stack.push((child, branch));
                }
            }
        }
    }
    paths
}
