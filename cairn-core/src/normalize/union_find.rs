/// Disjoint-set forest over root indices with path compression.
///
/// Representative choice is the caller's: [`UnionFind::link`] always makes
/// `parent` the representative.
#[derive(Debug, Clone)]
pub struct UnionFind {
    parent: Vec<usize>,
}

impl UnionFind {
    pub fn new(len: usize) -> Self {
        Self {
            parent: (0..len).collect(),
        }
    }

    pub fn find(&mut self, x: usize) -> usize {
        let mut root = x;
        while self.parent[root] != root {
            root = self.parent[root];
        }
        let mut node = x;
        while self.parent[node] != root {
            let next = self.parent[node];
            self.parent[node] = root;
            node = next;
        }
        root
    }

    /// Lookup without compression.
    pub fn find_const(&self, x: usize) -> usize {
        let mut root = x;
        while self.parent[root] != root {
            root = self.parent[root];
        }
        root
    }

    /// Attach the set of `child` under the set of `parent`.
    pub fn link(&mut self, parent: usize, child: usize) {
        let p = self.find(parent);
        let c = self.find(child);
        if p != c {
            self.parent[c] = p;
        }
    }

    pub fn same(&mut self, a: usize, b: usize) -> bool {
        self.find(a) == self.find(b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn link_sets_representative() {
        let mut uf = UnionFind::new(4);
        uf.link(2, 0);
        uf.link(2, 1);
        assert_eq!(uf.find(0), 2);
        assert_eq!(uf.find(1), 2);
        assert!(uf.same(0, 1));
        assert!(!uf.same(0, 3));
    }

    #[test]
    fn compression_keeps_answers() {
        let mut uf = UnionFind::new(5);
        uf.link(1, 0);
        uf.link(2, 1);
        uf.link(3, 2);
        assert_eq!(uf.find_const(0), 3);
        assert_eq!(uf.find(0), 3);
        assert_eq!(uf.find_const(0), 3);
    }
}
