use crate::shared::rectangle::Rectangle;

/// Relative tolerance for two candidates to count as the same object.
pub const DEFAULT_GROUP_EPS: f64 = 0.2;

/// Clusters raw multiscale candidates and keeps the well-supported ones.
///
/// Candidates are similar when all four edges differ by at most
/// `eps * (min(w1, w2) + min(h1, h2)) / 2`. Each cluster is averaged into
/// one rectangle and kept only if it has more than `min_neighbors`
/// members. Small clusters sitting inside a better-supported one are then
/// removed. `min_neighbors == 0` returns the candidates ungrouped.
pub fn group_rectangles(candidates: &[Rectangle], min_neighbors: u32, eps: f64) -> Vec<Rectangle> {
    if min_neighbors == 0 || candidates.is_empty() {
        return candidates.to_vec();
    }

    let labels = partition(candidates, eps);
    let n_classes = labels.iter().copied().max().map_or(0, |m| m + 1);

    let mut sums = vec![[0i64; 4]; n_classes];
    let mut counts = vec![0u32; n_classes];
    for (rect, &label) in candidates.iter().zip(&labels) {
        let s = &mut sums[label];
        s[0] += rect.x as i64;
        s[1] += rect.y as i64;
        s[2] += rect.width as i64;
        s[3] += rect.height as i64;
        counts[label] += 1;
    }

    let averaged: Vec<Rectangle> = sums
        .iter()
        .zip(&counts)
        .map(|(s, &n)| {
            let n = n as f64;
            Rectangle::new(
                (s[0] as f64 / n).round() as u32,
                (s[1] as f64 / n).round() as u32,
                (s[2] as f64 / n).round() as u32,
                (s[3] as f64 / n).round() as u32,
            )
        })
        .collect();

    let mut kept = Vec::new();
    for (i, r1) in averaged.iter().enumerate() {
        let n1 = counts[i];
        if n1 <= min_neighbors {
            continue;
        }
        let swallowed = averaged.iter().enumerate().any(|(j, r2)| {
            let n2 = counts[j];
            if i == j || n2 <= min_neighbors {
                return false;
            }
            let dx = (r2.width as f64 * eps).round() as i64;
            let dy = (r2.height as f64 * eps).round() as i64;
            let inside = r1.x as i64 >= r2.x as i64 - dx
                && r1.y as i64 >= r2.y as i64 - dy
                && r1.right() as i64 <= r2.right() as i64 + dx
                && r1.bottom() as i64 <= r2.bottom() as i64 + dy;
            inside && (n2 > n1.max(3) || n1 < 3)
        });
        if !swallowed {
            kept.push(*r1);
        }
    }
    kept
}

fn similar(a: &Rectangle, b: &Rectangle, eps: f64) -> bool {
    let delta = eps * (a.width.min(b.width) as f64 + a.height.min(b.height) as f64) * 0.5;
    let close = |p: u32, q: u32| (p as f64 - q as f64).abs() <= delta;
    close(a.x, b.x) && close(a.y, b.y) && close(a.right(), b.right()) && close(a.bottom(), b.bottom())
}

/// Union-find over the similarity relation. Labels are dense and numbered
/// in order of first appearance.
fn partition(rects: &[Rectangle], eps: f64) -> Vec<usize> {
    let mut parent: Vec<usize> = (0..rects.len()).collect();

    fn find(parent: &mut [usize], mut i: usize) -> usize {
        while parent[i] != i {
            parent[i] = parent[parent[i]];
            i = parent[i];
        }
        i
    }

    for i in 0..rects.len() {
        for j in (i + 1)..rects.len() {
            if similar(&rects[i], &rects[j], eps) {
                let (ri, rj) = (find(&mut parent, i), find(&mut parent, j));
                if ri != rj {
                    parent[rj.max(ri)] = ri.min(rj);
                }
            }
        }
    }

    let mut label_of_root = vec![usize::MAX; rects.len()];
    let mut next = 0;
    (0..rects.len())
        .map(|i| {
            let root = find(&mut parent, i);
            if label_of_root[root] == usize::MAX {
                label_of_root[root] = next;
                next += 1;
            }
            label_of_root[root]
        })
        .collect()
}
